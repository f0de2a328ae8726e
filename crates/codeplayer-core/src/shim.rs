//! Console interception shim.
//!
//! The shim is plain JavaScript injected into the composed document ahead of
//! the user script. The sandbox cannot read host state, so the capture flag and
//! execution id are baked into the text at composition time.

const SHOULD_CAPTURE: &str = "__CODEPLAYER_SHOULD_CAPTURE__";
const EXECUTION_ID: &str = "__CODEPLAYER_EXECUTION_ID__";

const SHIM_TEMPLATE: &str = r#"(function() {
  var shouldCapture = __CODEPLAYER_SHOULD_CAPTURE__;
  var executionId = __CODEPLAYER_EXECUTION_ID__;

  function format(arg) {
    if (typeof arg === 'object') {
      try {
        return JSON.stringify(arg, null, 2);
      } catch (e) {
        return String(arg);
      }
    }
    return String(arg);
  }

  function sendLog(kind, args) {
    if (!shouldCapture) {
      return;
    }
    window.parent.postMessage({
      type: 'console',
      logType: kind,
      executionId: executionId,
      message: args.map(format).join(' ')
    }, '*');
  }

  ['log', 'warn', 'error', 'info'].forEach(function(kind) {
    var original = console[kind];
    console[kind] = function(...args) {
      original.apply(console, args);
      sendLog(kind, args);
    };
  });

  window.onerror = function(message) {
    console.error(String(message));
    return true;
  };
})();"#;

/// Render the shim for one run.
pub fn console_shim(should_capture: bool, execution_id: u64) -> String {
    SHIM_TEMPLATE
        .replace(SHOULD_CAPTURE, if should_capture { "true" } else { "false" })
        .replace(EXECUTION_ID, &execution_id.to_string())
}
