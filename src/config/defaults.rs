// src/config/defaults.rs

//! The built-in pipeline, used when no `Assetpipe.toml` exists.
//!
//! Layout expected under `source/`: `sass/style.scss`, `css/vendor/`, `js/`,
//! `js/vendor/`, `img/` (icons for the sprite in `img/icons/`), `fonts/` and
//! top-level `*.html` pages. Filter commands run with the source directory as
//! working directory.

pub const DEFAULT_CONFIG: &str = r#"
[config]
source = "source"
build = "build"
debounce_ms = 100

[server]
host = "127.0.0.1"
port = 3000

[task.clean]
kind = "clean"

[task.copy]
kind = "copy"
src = ["fonts/*.{woff2,woff}"]
base = ""
after = ["clean"]

[task.styles]
kind = "style"
src = ["sass/style.scss"]
dest = "css"
rename = "style.min.css"
filter = "sass --stdin --embed-source-map --embed-sources --load-path=sass"
after = ["copy"]

[task.vendor_css]
kind = "copy"
src = ["css/vendor/*.css*"]
base = "css/vendor"
dest = "css"
outputs = ["css/*.css*", "!css/style.min.css", "!css/style.min.css.map"]
after = ["copy"]

[task.html]
kind = "copy"
src = ["*.html"]
after = ["copy"]

[task.scripts]
kind = "copy"
src = ["js/*.js"]
dest = "js"
filter = "terser --compress --mangle"
after = ["copy"]

[task.vendor_js]
kind = "copy"
src = ["js/vendor/*.js*"]
base = "js"
dest = "js"
after = ["copy"]

[task.images]
kind = "image"
src = ["img/**/*.{jpg,png,svg}", "!img/sprite.svg"]
dest = "img"
modes = ["build"]
after = ["copy"]

[task.copy_images]
kind = "copy"
src = ["img/**/*.{jpg,png,svg}", "!img/sprite.svg"]
dest = "img"
modes = ["dev"]
after = ["copy"]

[task.sprite]
kind = "sprite"
src = ["img/icons/*.svg"]
dest = "img"
rename = "sprite.svg"
after = ["copy"]

[task.webp]
kind = "webp"
src = ["img/**/*.{jpg,png}", "!img/icons"]
dest = "img"
after = ["copy"]

[[watch]]
name = "styles"
paths = ["sass/**/*.scss"]
run = ["styles"]
notify = "inject"

[[watch]]
name = "scripts"
paths = ["js/**/*.js"]
run = ["scripts"]
notify = "reload"

[[watch]]
name = "markup"
paths = ["*.html"]
run = ["html"]
notify = "reload"
"#;
