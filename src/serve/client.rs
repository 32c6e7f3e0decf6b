// src/serve/client.rs

//! Browser side of live reload.

/// Path of the WebSocket endpoint.
pub const SOCKET_PATH: &str = "/__livereload";

/// Path the client script is served from.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Tag injected into every served HTML page.
pub const SCRIPT_TAG: &str = "<script src=\"/__livereload.js\"></script>";

/// Client script: reconnects after the server restarts, reloads the page on
/// `reload` and re-requests linked style sheets on `css`.
pub const CLIENT_JS: &str = r#"(function () {
  var proto = location.protocol === "https:" ? "wss://" : "ws://";
  function refreshStyles() {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var stamp = Date.now();
    links.forEach(function (link) {
      var url = new URL(link.href);
      url.searchParams.set("livereload", stamp);
      link.href = url.toString();
    });
  }
  function connect() {
    var socket = new WebSocket(proto + location.host + "/__livereload");
    socket.onmessage = function (event) {
      if (event.data === "css") {
        refreshStyles();
      } else if (event.data === "reload") {
        location.reload();
      }
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

/// Insert [`SCRIPT_TAG`] before the last `</body>` (any case), or append it
/// when the page has no body end tag.
pub fn inject_client(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + SCRIPT_TAG.len());
            out.push_str(&html[..idx]);
            out.push_str(SCRIPT_TAG);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{SCRIPT_TAG}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_goes_before_body_end() {
        let out = inject_client("<html><BODY><p>hi</p></BODY></html>");
        assert_eq!(
            out,
            "<html><BODY><p>hi</p><script src=\"/__livereload.js\"></script></BODY></html>"
        );
    }

    #[test]
    fn fragment_gets_script_appended() {
        assert!(inject_client("<p>x</p>").ends_with(SCRIPT_TAG));
    }

    #[test]
    fn client_connects_to_the_socket_path() {
        assert!(CLIENT_JS.contains(SOCKET_PATH));
        assert!(SCRIPT_TAG.contains(SCRIPT_PATH));
    }
}
