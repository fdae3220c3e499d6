use std::sync::{Arc, Mutex, OnceLock};

use confscope_core::error::CommandError;
use confscope_core::host::memory::MemoryCommands;
use confscope_core::host::{CommandRegistry, command_handler};
use confscope_core::interceptor::{CommandInterceptor, InterceptMode, hook, sync_hook};
use serde_json::json;

const PASTE: &str = "editor.action.clipboardPasteAction";

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: &str) {
    log.lock().unwrap().push(entry.to_string());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn interceptor(commands: &Arc<MemoryCommands>, mode: InterceptMode, log: &Log) -> CommandInterceptor {
    let action_log = log.clone();
    let callback_log = log.clone();
    CommandInterceptor::new(
        PASTE,
        mode,
        commands.clone(),
        sync_hook(move || push(&action_log, "action")),
        Some(hook(move || {
            let log = callback_log.clone();
            async move { push(&log, "callback") }
        })),
    )
}

fn base_handler(commands: &MemoryCommands, log: &Log) -> confscope_core::host::CommandRegistration {
    let log = log.clone();
    commands.register(
        PASTE,
        command_handler(move |_args| {
            let log = log.clone();
            async move {
                push(&log, "base");
                Ok(Some(json!("pasted")))
            }
        }),
    )
}

#[tokio::test]
async fn strong_interceptor_wraps_every_invocation() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();
    let _base = base_handler(&commands, &log);

    let wrapper = interceptor(&commands, InterceptMode::Strong, &log);
    assert!(wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 2);

    let result = commands.execute(PASTE, vec![]).await.unwrap();
    assert_eq!(result, Some(json!("pasted")));
    assert_eq!(entries(&log), vec!["action", "base", "callback"]);

    commands.execute(PASTE, vec![]).await.unwrap();
    assert_eq!(entries(&log).len(), 6);
    assert!(wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 2);
}

#[tokio::test]
async fn strong_interceptor_destroyed_mid_call_stays_down() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();
    let slot: Arc<OnceLock<CommandInterceptor>> = Arc::new(OnceLock::new());

    let owner = slot.clone();
    let base_log = log.clone();
    let _base = commands.register(
        PASTE,
        command_handler(move |_args| {
            if let Some(wrapper) = owner.get() {
                wrapper.destroy();
            }
            let log = base_log.clone();
            async move {
                push(&log, "base");
                Ok(None)
            }
        }),
    );
    assert!(slot.set(interceptor(&commands, InterceptMode::Strong, &log)).is_ok());

    commands.execute(PASTE, vec![]).await.unwrap();

    assert_eq!(entries(&log), vec!["action", "base", "callback"]);
    let wrapper = slot.get().unwrap();
    assert!(!wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 1);

    // An explicit register brings it back.
    wrapper.register();
    assert!(wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 2);
}

#[tokio::test]
async fn weak_interceptor_fires_once_per_arming() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();
    let _base = base_handler(&commands, &log);

    let wrapper = interceptor(&commands, InterceptMode::Weak, &log);
    assert!(!wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 1);

    wrapper.register();
    wrapper.register();
    assert_eq!(commands.handler_count(PASTE), 2);

    commands.execute(PASTE, vec![]).await.unwrap();
    assert_eq!(entries(&log), vec!["action", "base", "callback"]);
    assert!(!wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 1);

    commands.execute(PASTE, vec![]).await.unwrap();
    assert_eq!(entries(&log), vec!["action", "base", "callback", "base"]);
}

#[tokio::test]
async fn redispatch_reaches_underlying_handler_with_arguments() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = received.clone();
    let _base = commands.register(
        PASTE,
        command_handler(move |args| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().extend(args);
                Ok(None)
            }
        }),
    );
    let _wrapper = interceptor(&commands, InterceptMode::Strong, &log);

    commands.execute(PASTE, vec![json!("text"), json!(2)]).await.unwrap();

    assert_eq!(*received.lock().unwrap(), vec![json!("text"), json!(2)]);
    assert_eq!(commands.executed(), vec![PASTE, PASTE]);
}

#[tokio::test]
async fn underlying_failure_still_runs_callback() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();
    let wrapper = interceptor(&commands, InterceptMode::Strong, &log);

    let result = commands.execute(PASTE, vec![]).await;

    assert!(matches!(result, Err(CommandError::NotFound(ref id)) if id == PASTE));
    assert_eq!(entries(&log), vec!["action", "callback"]);
    assert!(wrapper.is_registered());
}

#[tokio::test]
async fn destroy_is_idempotent_and_uncovers_base() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();
    let _base = base_handler(&commands, &log);
    let wrapper = interceptor(&commands, InterceptMode::Strong, &log);

    wrapper.destroy();
    wrapper.destroy();
    assert!(!wrapper.is_registered());
    assert_eq!(commands.handler_count(PASTE), 1);

    commands.execute(PASTE, vec![]).await.unwrap();
    assert_eq!(entries(&log), vec!["base"]);
}

#[tokio::test]
async fn dropping_interceptor_unregisters() {
    let commands = Arc::new(MemoryCommands::new());
    let log = Log::default();

    {
        let _wrapper = interceptor(&commands, InterceptMode::Strong, &log);
        assert_eq!(commands.handler_count(PASTE), 1);
    }

    assert_eq!(commands.handler_count(PASTE), 0);
}
