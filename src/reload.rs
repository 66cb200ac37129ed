//! Live-reload signals and the browser-side client that receives them.

/// A refresh request pushed to every connected browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reload {
    /// Re-fetch stylesheets in place, without reloading the page.
    Styles,
    /// Reload the whole page.
    Page,
}

impl Reload {
    /// The text frame sent over the WebSocket.
    pub fn as_message(self) -> &'static str {
        match self {
            Reload::Styles => "styles",
            Reload::Page => "reload",
        }
    }
}

/// Sent once to each new client when the server announces readiness.
pub(crate) const MESSAGE_READY: &str = "ready";

const SCRIPT: &str = r#"(() => {
  const socket = new WebSocket(`ws://${location.hostname || "localhost"}:__PORT__`);
  socket.addEventListener("message", (event) => {
    switch (event.data) {
      case "reload":
        location.reload();
        break;
      case "styles":
        for (const link of document.querySelectorAll('link[rel="stylesheet"]')) {
          const url = new URL(link.href);
          url.searchParams.set("v", Date.now());
          link.href = url.href;
        }
        break;
      case "ready": {
        const banner = document.createElement("div");
        banner.textContent = "Connected to kumitate";
        banner.style.cssText = "position:fixed;top:0;right:0;padding:.5em 1em;background:#222;color:#fff;font:13px sans-serif;z-index:99999";
        document.body.append(banner);
        setTimeout(() => banner.remove(), 2000);
        break;
      }
    }
  });
})();"#;

/// Client script connecting to the live-reload socket on `port`.
pub fn script(port: u16) -> String {
    SCRIPT.replace("__PORT__", &port.to_string())
}
