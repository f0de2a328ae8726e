//! Script engine setup for one render.
//!
//! Each call to [`execute`] builds a fresh `boa_engine` context, installs the
//! browser-like globals the composed document expects, and runs the inline
//! scripts in order. The relay is the only way out of the context.

use std::cell::RefCell;

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsResult, JsString, JsValue, NativeFunction, Source, js_string};

use super::document::ParsedDocument;
use crate::relay::RelaySender;

/// Tracing target for the sandbox's own console output.
pub(crate) const CONSOLE_TARGET: &str = "codeplayer::sandbox";

const RELAY_FN: &str = "__codeplayer_relay";
const REPORT_ERROR_FN: &str = "__codeplayer_report_error";
const DRAIN_TIMERS_FN: &str = "__codeplayer_drain_timers";

/// Globals every document sees before its first script.
///
/// Timers run on virtual time after the document's scripts finish, earliest
/// deadline first.
const PRELUDE: &str = r#"
var window = globalThis;
var self = globalThis;

window.parent = {
  postMessage: function(data, targetOrigin) {
    __codeplayer_relay(JSON.stringify(data));
  }
};

globalThis.__codeplayer_report_error = function(error) {
  var message = 'Uncaught ' + String(error);
  if (typeof window.onerror === 'function') {
    window.onerror(message);
  }
};

(function() {
  var queue = [];
  var nextId = 1;
  var now = 0;

  globalThis.setTimeout = function(callback, delay, ...args) {
    var id = nextId++;
    queue.push({ id: id, at: now + Math.max(0, Number(delay) || 0), callback: callback, args: args });
    return id;
  };

  globalThis.clearTimeout = function(id) {
    queue = queue.filter(function(timer) { return timer.id !== id; });
  };

  globalThis.__codeplayer_drain_timers = function(limit) {
    var fired = 0;
    while (queue.length > 0 && fired < limit) {
      var next = 0;
      for (var i = 1; i < queue.length; i++) {
        if (queue[i].at < queue[next].at) {
          next = i;
        }
      }
      var timer = queue.splice(next, 1)[0];
      now = timer.at;
      fired++;
      try {
        if (typeof timer.callback === 'function') {
          timer.callback.apply(globalThis, timer.args);
        } else {
          (0, eval)(String(timer.callback));
        }
      } catch (e) {
        __codeplayer_report_error(e);
      }
    }
    return queue.length;
  };
})();
"#;

// `NativeFunction::from_fn_ptr` cannot capture, so the relay sender for the
// render in progress lives in a thread-local. Renders are serialized on the
// sandbox thread.
thread_local! {
    static RELAY: RefCell<Option<RelaySender>> = const { RefCell::new(None) };
}

/// Clears the thread-local relay when a render ends, however it ends.
struct RelayGuard;

impl RelayGuard {
    fn install(relay: &RelaySender) -> Self {
        RELAY.with(|slot| *slot.borrow_mut() = Some(relay.clone()));
        Self
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        RELAY.with(|slot| slot.borrow_mut().take());
    }
}

/// Outcome of one render.
#[derive(Debug, Default)]
pub(crate) struct ExecutionReport {
    /// Uncaught errors, already reported to `window.onerror`.
    pub errors: Vec<String>,
    /// Timers still queued when the callback budget ran out.
    pub pending_timers: usize,
}

/// Run a document's scripts in a brand-new context.
pub(crate) fn execute(
    document: &ParsedDocument,
    relay: &RelaySender,
    max_timer_callbacks: usize,
) -> ExecutionReport {
    let _guard = RelayGuard::install(relay);
    let mut report = ExecutionReport::default();

    let mut context = match new_context() {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!("Failed to initialize sandbox context: {}", e);
            report.errors.push(e.to_string());
            return report;
        }
    };

    for script in &document.scripts {
        if let Err(e) = context.eval(Source::from_bytes(script.as_bytes())) {
            report_uncaught(&mut context, &e, &mut report);
        }
        context.run_jobs();
    }

    let limit = JsValue::from(max_timer_callbacks as f64);
    match call_global(&mut context, DRAIN_TIMERS_FN, &[limit]) {
        Ok(remaining) => {
            report.pending_timers = remaining.as_number().unwrap_or(0.0) as usize;
            if report.pending_timers > 0 {
                tracing::debug!(
                    "Timer budget of {} exhausted, dropping {} pending timers",
                    max_timer_callbacks,
                    report.pending_timers
                );
            }
        }
        Err(e) => report_uncaught(&mut context, &e, &mut report),
    }
    context.run_jobs();

    report
}

/// Build a context with the sandbox globals installed.
pub(crate) fn new_context() -> JsResult<Context> {
    let mut context = Context::default();
    register_console(&mut context)?;
    context.register_global_callable(
        JsString::from(RELAY_FN),
        1,
        NativeFunction::from_fn_ptr(relay_post),
    )?;
    context.eval(Source::from_bytes(PRELUDE.as_bytes()))?;
    Ok(context)
}

fn report_uncaught(context: &mut Context, error: &JsError, report: &mut ExecutionReport) {
    tracing::debug!(target: CONSOLE_TARGET, "Uncaught {}", error);
    report.errors.push(error.to_string());

    let value = error.to_opaque(context);
    if let Err(e) = call_global(context, REPORT_ERROR_FN, &[value]) {
        // window.onerror itself threw; browsers swallow this too.
        tracing::debug!(target: CONSOLE_TARGET, "Error handler failed: {}", e);
    }
}

fn call_global(context: &mut Context, name: &str, args: &[JsValue]) -> JsResult<JsValue> {
    let global = context.global_object();
    let function = global.get(JsString::from(name), context)?;
    match function.as_callable() {
        Some(callable) => callable.call(&JsValue::undefined(), args, context),
        None => Ok(JsValue::undefined()),
    }
}

fn relay_post(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let Some(data) = args.first() else {
        return Ok(JsValue::undefined());
    };
    if data.is_undefined() {
        return Ok(JsValue::undefined());
    }
    let payload = data.to_string(context)?.to_std_string_escaped();
    RELAY.with(|slot| {
        if let Some(relay) = slot.borrow().as_ref() {
            if !relay.post(payload) {
                tracing::trace!("Relay closed, dropping message");
            }
        }
    });
    Ok(JsValue::undefined())
}

fn join_args(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(context)?.to_std_string_escaped());
    }
    Ok(parts.join(" "))
}

fn console_log(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let message = join_args(args, context)?;
    tracing::debug!(target: CONSOLE_TARGET, kind = "log", "{}", message);
    Ok(JsValue::undefined())
}

fn console_info(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let message = join_args(args, context)?;
    tracing::debug!(target: CONSOLE_TARGET, kind = "info", "{}", message);
    Ok(JsValue::undefined())
}

fn console_warn(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let message = join_args(args, context)?;
    tracing::debug!(target: CONSOLE_TARGET, kind = "warn", "{}", message);
    Ok(JsValue::undefined())
}

fn console_error(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let message = join_args(args, context)?;
    tracing::debug!(target: CONSOLE_TARGET, kind = "error", "{}", message);
    Ok(JsValue::undefined())
}

fn register_console(context: &mut Context) -> JsResult<()> {
    let console = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(console_log), js_string!("log"), 0)
        .function(NativeFunction::from_fn_ptr(console_info), js_string!("info"), 0)
        .function(NativeFunction::from_fn_ptr(console_warn), js_string!("warn"), 0)
        .function(NativeFunction::from_fn_ptr(console_error), js_string!("error"), 0)
        .build();

    context.register_global_property(js_string!("console"), console, Attribute::all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ComposeOptions, compose};
    use crate::relay::{self, LogKind, RelayMessage};
    use crate::source::{ExecutionId, SourceBuffers};

    fn run(sources: SourceBuffers, capture: bool) -> (ExecutionReport, Vec<RelayMessage>) {
        let (tx, mut rx) = relay::channel();
        let options = if capture {
            ComposeOptions::capturing(ExecutionId::new(1))
        } else {
            ComposeOptions::silent(ExecutionId::new(1))
        };
        let document = ParsedDocument::parse(compose(&sources, options).as_str());
        let report = execute(&document, &tx, 100);
        drop(tx);

        let mut messages = Vec::new();
        while let Some(payload) = rx.try_recv() {
            messages.extend(RelayMessage::decode(&payload));
        }
        (report, messages)
    }

    fn console(kind: LogKind, message: &str) -> RelayMessage {
        RelayMessage::Console {
            log_type: kind,
            execution_id: ExecutionId::new(1),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_all_severities_relayed_in_order() {
        let (_, messages) = run(
            SourceBuffers::new(
                "",
                "",
                "console.log('a'); console.warn('b'); console.error('c'); console.info('d');",
            ),
            true,
        );
        assert_eq!(
            messages,
            vec![
                console(LogKind::Log, "a"),
                console(LogKind::Warn, "b"),
                console(LogKind::Error, "c"),
                console(LogKind::Info, "d"),
            ]
        );
    }

    #[test]
    fn test_silent_run_relays_nothing() {
        let (_, messages) = run(
            SourceBuffers::new("", "", "console.log(1); console.log(2); console.log(3);"),
            false,
        );
        assert!(messages.is_empty());
    }

    #[test]
    fn test_arguments_formatted_and_joined() {
        let (_, messages) = run(
            SourceBuffers::new("", "", "console.log('n =', 3, {a: 1}, [1, 2], null);"),
            true,
        );
        assert_eq!(
            messages,
            vec![console(
                LogKind::Log,
                "n = 3 {\n  \"a\": 1\n} [\n  1,\n  2\n] null"
            )]
        );
    }

    #[test]
    fn test_circular_object_falls_back_to_string() {
        let (_, messages) = run(
            SourceBuffers::new("", "", "var o = {}; o.self = o; console.log('cycle', o);"),
            true,
        );
        assert_eq!(messages, vec![console(LogKind::Log, "cycle [object Object]")]);
    }

    #[test]
    fn test_uncaught_error_becomes_error_record() {
        let (report, messages) = run(
            SourceBuffers::new("", "", "console.log('before'); missingFunction();"),
            true,
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], console(LogKind::Log, "before"));
        match &messages[1] {
            RelayMessage::Console { log_type, message, .. } => {
                assert_eq!(*log_type, LogKind::Error);
                assert!(message.starts_with("Uncaught ReferenceError"), "{message}");
            }
        }
    }

    #[test]
    fn test_later_scripts_run_after_error() {
        let (_, messages) = run(
            SourceBuffers::new("<script>throw new Error('boom');</script>", "", "console.log('still here')"),
            true,
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], console(LogKind::Log, "still here"));
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let (report, messages) = run(
            SourceBuffers::new(
                "",
                "",
                "setTimeout(() => console.log('late'), 50);\n\
                 setTimeout(() => console.log('early'), 10);\n\
                 var t = setTimeout(() => console.log('never'), 20);\n\
                 clearTimeout(t);\n\
                 console.log('sync');",
            ),
            true,
        );
        assert_eq!(report.pending_timers, 0);
        assert_eq!(
            messages,
            vec![
                console(LogKind::Log, "sync"),
                console(LogKind::Log, "early"),
                console(LogKind::Log, "late"),
            ]
        );
    }

    #[test]
    fn test_timer_budget_bounds_rescheduling() {
        let (report, messages) = run(
            SourceBuffers::new("", "", "function tick() { setTimeout(tick, 1); } tick();"),
            true,
        );
        assert_eq!(report.pending_timers, 1);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_fresh_context_per_render() {
        let (tx, _rx) = relay::channel();
        let first = ParsedDocument {
            scripts: vec!["var leaked = 1;".to_string()],
            ..Default::default()
        };
        let second = ParsedDocument {
            scripts: vec!["leaked;".to_string()],
            ..Default::default()
        };
        assert!(execute(&first, &tx, 10).errors.is_empty());
        assert_eq!(execute(&second, &tx, 10).errors.len(), 1);
    }

    #[test]
    fn test_no_relay_after_render() {
        let (tx, _rx) = relay::channel();
        execute(&ParsedDocument::default(), &tx, 10);
        RELAY.with(|slot| assert!(slot.borrow().is_none()));
    }
}
