//! End-to-end capture: request JSON, resolution, install, probe invocation, sink.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use callscope::prelude::*;
use parking_lot::Mutex;

/// Native layer stand-in keeping the last install and the registered entry point.
#[derive(Default)]
struct FakeRuntime {
    installed: Mutex<Option<InstallBatch>>,
    uninstalls: AtomicUsize,
    entry_point: Mutex<Option<Arc<ProbeEntryPoint>>>,
}

impl FakeRuntime {
    fn fire(&self, method_id: u64, args: &[ArgumentValue], context: &ProbeContext) {
        let entry_point = self.entry_point.lock().clone();
        if let Some(entry_point) = entry_point {
            entry_point.invoke(method_id, args, context);
        }
    }

    fn installed(&self) -> InstallBatch {
        self.installed.lock().clone().expect("nothing installed")
    }
}

impl NativeBridge for FakeRuntime {
    fn install(&self, batch: &InstallBatch) -> Result<()> {
        *self.installed.lock() = Some(batch.clone());
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        *self.installed.lock() = None;
        Ok(())
    }

    fn register_entry_point(&self, entry_point: Arc<ProbeEntryPoint>) -> Result<()> {
        *self.entry_point.lock() = Some(entry_point);
        Ok(())
    }
}

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl CollectingSink {
    fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(LogEntry::message).collect()
    }
}

impl CaptureSink for CollectingSink {
    fn write(&self, entry: &LogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

const BAR_INT: u64 = 0x0000_0001_0600_0001;
const BAR_STRING: u64 = 0x0000_0001_0600_0002;
const PAIR: u64 = 0x0000_0001_0600_0003;

const BAR_REQUEST: &str =
    r#"{"methods":[{"moduleName":"App.dll","className":"Contoso.Foo","methodName":"Bar"}]}"#;

// static void Foo.Pair(ValueTuple<int, int> pair) - GENERICINST VALUETYPE TypeRef#1 2 I4 I4
const PAIR_SIGNATURE: [u8; 9] = [0x00, 0x01, 0x01, 0x15, 0x11, 0x05, 0x02, 0x08, 0x08];
const PAIR_LOCAL: [u8; 8] = [0x07, 0x01, 0x15, 0x11, 0x05, 0x02, 0x08, 0x08];

fn foo() -> RuntimeType {
    RuntimeType::class("Contoso", "Foo")
}

fn catalog() -> StaticCatalog {
    let int32 = RuntimeType::primitive(PrimitiveType::Int32);
    let pair = RuntimeType::value_type("System", "ValueTuple`2")
        .with_generic_args(vec![int32.clone(), int32.clone()]);

    let catalog = StaticCatalog::new();
    catalog.add(
        LoadedModule::new(1, "App.dll")
            .with_local_signature(Token::new(0x1100_0001), PAIR_LOCAL.to_vec())
            .with_method(
                MethodInfo::new(Token::new(0x0600_0001), Some(foo()), "Bar")
                    .with_param(ParameterInfo::new("x", int32.clone())),
            )
            .with_method(
                MethodInfo::new(Token::new(0x0600_0002), Some(foo()), "Bar")
                    .with_param(ParameterInfo::new("x", RuntimeType::string())),
            )
            .with_method(
                MethodInfo::new(Token::new(0x0600_0003), Some(foo()), "Pair")
                    .with_param(ParameterInfo::new("pair", pair))
                    .with_signature(PAIR_SIGNATURE.to_vec()),
            ),
    );
    catalog.add(
        LoadedModule::new(2, "Dynamic.dll")
            .dynamic()
            .with_method(MethodInfo::new(Token::new(0x0600_0001), Some(foo()), "Bar")),
    );
    catalog
}

struct Harness {
    runtime: Arc<FakeRuntime>,
    sink: Arc<CollectingSink>,
    service: CaptureService,
}

fn harness() -> Harness {
    let runtime = Arc::new(FakeRuntime::default());
    let sink = Arc::new(CollectingSink::default());
    let service = CaptureService::new(
        Arc::new(catalog()),
        runtime.clone(),
        sink.clone(),
        CaptureConfig::default(),
    )
    .unwrap();
    Harness {
        runtime,
        sink,
        service,
    }
}

#[test]
fn capture_all_overloads() {
    let h = harness();
    let events = h.service.events().subscribe(None);

    let outcome = h
        .service
        .start_json(
            r#"{
                "methods": [{
                    "moduleName": "app.dll",
                    "className": "Contoso.Foo",
                    "methodName": "Bar",
                    "filterByParameters": false
                }],
                "duration": "PT5M"
            }"#,
        )
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started { methods: 2 });
    assert_eq!(h.service.state(), SessionState::Capturing);

    let batch = h.runtime.installed();
    assert_eq!(batch.method_ids, vec![BAR_INT, BAR_STRING]);
    assert_eq!(batch.boxing_tokens, vec![vec![7], vec![0]]);
    assert_eq!(batch.argument_counts, vec![1, 1]);

    h.runtime
        .fire(BAR_INT, &[ArgumentValue::I32(-4)], &ProbeContext::default());
    h.runtime.fire(
        BAR_STRING,
        &[ArgumentValue::String("a \"b\"".into())],
        &ProbeContext::traced(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            TraceIdFormat::W3C,
        ),
    );
    h.runtime.fire(PAIR, &[ArgumentValue::Unsupported], &ProbeContext::default());

    assert_eq!(h.service.stop().unwrap(), StopOutcome::Stopped);
    assert_eq!(
        events.drain(),
        vec![
            ControlEvent::CapturingStarted,
            ControlEvent::CapturingStopped,
            ControlEvent::Flush
        ]
    );

    assert_eq!(
        h.sink.messages(),
        vec![
            "Contoso.Foo.Bar(x: -4)".to_string(),
            r#"Contoso.Foo.Bar(x: "a \"b\"")"#.to_string()
        ]
    );
    let entries = h.sink.entries.lock();
    assert_eq!(entries[0].scope.module_name, "App.dll");
    assert_eq!(entries[0].scope.method_name, "Bar");
    assert_eq!(entries[1].scope.trace_format, Some("W3C"));
}

#[test]
fn generic_value_type_uses_signature_blob() {
    let h = harness();
    let request = CaptureRequest {
        methods: vec![MethodDescription::new("App.dll", "Contoso.Foo", "Pair")],
        duration: Duration::from_secs(60),
    };
    h.service.start(request).unwrap();

    let batch = h.runtime.installed();
    assert_eq!(batch.method_ids, vec![PAIR]);
    // marker, byte length, then GENERICINST VALUETYPE TypeRef#1 2 I4 I4 packed little-endian
    assert_eq!(
        batch.boxing_tokens[0],
        vec![0xFFFF_FFFE, 6, 0x0205_1115, 0x0000_0808]
    );

    h.runtime.fire(
        PAIR,
        &[ArgumentValue::Object {
            type_name: "System.ValueTuple`2[System.Int32,System.Int32]".into(),
            display: Some("(1, 2)".into()),
        }],
        &ProbeContext::default(),
    );
    h.service.stop().unwrap();
    assert_eq!(h.sink.messages(), vec!["Contoso.Foo.Pair(pair: (1, 2))"]);
}

#[test]
fn overload_filter_and_unresolved_batches() {
    let h = harness();

    let filtered = MethodDescription::new("App.dll", "Contoso.Foo", "Bar")
        .with_parameter_types(["System.String"]);
    let missing = MethodDescription::new("Dynamic.dll", "Contoso.Foo", "Bar");

    let error = h
        .service
        .start(CaptureRequest {
            methods: vec![filtered.clone(), missing],
            duration: Duration::from_secs(60),
        })
        .unwrap_err();
    assert!(matches!(error, Error::UnresolvedMethods(ref indices) if indices == &[1]));
    assert!(h.runtime.installed.lock().is_none());

    h.service
        .start(CaptureRequest {
            methods: vec![filtered],
            duration: Duration::from_secs(60),
        })
        .unwrap();
    assert_eq!(h.runtime.installed().method_ids, vec![BAR_STRING]);
}

#[test]
fn excluded_threads_do_not_log() {
    let h = harness();
    h.service
        .start_json(BAR_REQUEST)
        .unwrap();

    let runtime = Arc::clone(&h.runtime);
    std::thread::Builder::new()
        .name(".NET Console Logger".into())
        .spawn(move || runtime.fire(BAR_INT, &[ArgumentValue::I32(1)], &ProbeContext::default()))
        .unwrap()
        .join()
        .unwrap();
    h.runtime.fire(BAR_INT, &[ArgumentValue::I32(2)], &ProbeContext::default());

    h.service.stop().unwrap();
    assert_eq!(h.sink.messages(), vec!["Contoso.Foo.Bar(x: 2)"]);
}

#[test]
fn session_expires_after_duration() {
    let h = harness();
    let stops = h.service.events().subscribe(Some(EventKind::CapturingStopped));

    h.service
        .start_json(
            r#"{
                "methods": [{
                    "moduleName": "App.dll",
                    "className": "Contoso.Foo",
                    "methodName": "Bar"
                }],
                "duration": "PT0.1S"
            }"#,
        )
        .unwrap();

    assert_eq!(
        stops.recv_timeout(Duration::from_secs(10)),
        Some(ControlEvent::CapturingStopped)
    );
    assert_eq!(h.service.state(), SessionState::Idle);
    assert_eq!(h.runtime.uninstalls.load(Ordering::SeqCst), 1);

    h.runtime.fire(BAR_INT, &[ArgumentValue::I32(9)], &ProbeContext::default());
    assert!(h.sink.messages().is_empty());
}

#[test]
fn concurrent_probes_are_all_logged() {
    let h = harness();
    h.service
        .start_json(BAR_REQUEST)
        .unwrap();

    let threads: Vec<_> = (0..8)
        .map(|thread| {
            let runtime = Arc::clone(&h.runtime);
            std::thread::spawn(move || {
                for call in 0..50 {
                    runtime.fire(
                        BAR_INT,
                        &[ArgumentValue::I32(thread * 100 + call)],
                        &ProbeContext::default(),
                    );
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    h.service.stop().unwrap();
    let logged = h.sink.messages().len() as u64;
    assert_eq!(logged + h.service.dropped_count(), 400);
}
