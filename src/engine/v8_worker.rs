//! V8 backend: one isolate per worker thread.
//!
//! The script is evaluated once into a context that lives as long as the
//! worker; each `Input` then calls the loaded function with freshly built
//! V8 values, so nothing the function does can reach the driver's copy of
//! the arguments. Terminating the worker calls
//! `IsolateHandle::terminate_execution`, which also pre-empts an infinite
//! loop.

use serde_json::Value as JsonValue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::worker::{FunctionRef, ThreadWorker, Worker, WorkerFactory, WorkerInbox, WorkerMessage};
use super::{initialize_v8, RunOutcome, DEFAULT_HEAP_MEMORY_MAX_MB};
use crate::error::Result;
use crate::spec::Args;

/// Deeper output is cut off, which also stops cyclic objects.
const MAX_OUTPUT_DEPTH: usize = 64;

type HandleSlot = Arc<Mutex<Option<v8::IsolateHandle>>>;

#[derive(Debug, Clone, Copy)]
pub struct V8WorkerFactory {
    heap_memory_max_bytes: usize,
}

impl Default for V8WorkerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_HEAP_MEMORY_MAX_MB * 1024 * 1024)
    }
}

impl V8WorkerFactory {
    pub fn new(heap_memory_max_bytes: usize) -> Self {
        Self {
            heap_memory_max_bytes,
        }
    }
}

impl WorkerFactory for V8WorkerFactory {
    fn spawn(&self) -> Result<Box<dyn Worker>> {
        initialize_v8();
        let slot: HandleSlot = Arc::default();
        let interrupt_slot = slot.clone();
        let interrupt: Box<dyn Fn() + Send> = Box::new(move || {
            let handle = interrupt_slot.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(handle) = handle.as_ref() {
                handle.terminate_execution();
            }
        });
        let heap_memory_max_bytes = self.heap_memory_max_bytes;
        let worker = ThreadWorker::spawn("typefuzz-v8", Some(interrupt), move |inbox| {
            serve(inbox, heap_memory_max_bytes, slot)
        })?;
        tracing::debug!("spawned V8 worker ({} bytes heap)", heap_memory_max_bytes);
        Ok(Box::new(worker))
    }
}

// ── V8 heap helpers ─────────────────────────────────────────────────────

fn create_params_with_heap_limit(heap_memory_max_bytes: usize) -> v8::CreateParams {
    v8::CreateParams::default().heap_limits(0, heap_memory_max_bytes)
}

struct HeapLimitCallbackData {
    isolate_ptr: *mut v8::Isolate,
    oom_flag: Arc<AtomicBool>,
}

unsafe impl Send for HeapLimitCallbackData {}
unsafe impl Sync for HeapLimitCallbackData {}

unsafe extern "C" fn near_heap_limit_callback(
    data: *mut std::ffi::c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    let cb_data = unsafe { &*(data as *const HeapLimitCallbackData) };
    cb_data.oom_flag.store(true, Ordering::SeqCst);
    let isolate = unsafe { &mut *cb_data.isolate_ptr };
    isolate.terminate_execution();
    // Headroom so the termination can unwind.
    current_heap_limit * 2
}

fn install_heap_limit_callback(
    isolate: &mut v8::Isolate,
    oom_flag: Arc<AtomicBool>,
) -> *mut HeapLimitCallbackData {
    let data = Box::new(HeapLimitCallbackData {
        isolate_ptr: isolate as *mut v8::Isolate,
        oom_flag,
    });
    let data_ptr = Box::into_raw(data);
    isolate.add_near_heap_limit_callback(
        near_heap_limit_callback,
        data_ptr as *mut std::ffi::c_void,
    );
    data_ptr
}

// ── Worker body ─────────────────────────────────────────────────────────

fn serve(inbox: WorkerInbox, heap_memory_max_bytes: usize, slot: HandleSlot) {
    let oom_flag = Arc::new(AtomicBool::new(false));

    let result = catch_unwind(AssertUnwindSafe(|| {
        let params = create_params_with_heap_limit(heap_memory_max_bytes);
        let mut isolate = v8::Isolate::new(params);
        *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(isolate.thread_safe_handle());
        if inbox.is_cancelled() {
            *slot.lock().unwrap_or_else(|p| p.into_inner()) = None;
            return;
        }
        let cb_data_ptr = install_heap_limit_callback(&mut isolate, oom_flag.clone());

        {
            let scope = &mut v8::HandleScope::new(&mut isolate);
            let context = v8::Context::new(scope, Default::default());
            let scope = &mut v8::ContextScope::new(scope, context);
            let mut function: Option<v8::Global<v8::Function>> = None;

            while let Some(message) = inbox.recv() {
                let outcome = match message {
                    WorkerMessage::Code(FunctionRef::Script {
                        module_ref,
                        source,
                        function_name,
                    }) => match load_function(scope, &module_ref, &source, &function_name) {
                        Ok(f) => {
                            function = Some(f);
                            RunOutcome::Output { value: None }
                        }
                        Err(message) => RunOutcome::Exception { message },
                    },
                    WorkerMessage::Code(FunctionRef::Native { name, .. }) => RunOutcome::Exception {
                        message: format!("V8 worker cannot run native function '{}'", name),
                    },
                    WorkerMessage::Input(args) => match &function {
                        Some(f) => call_function(scope, f, &args, &oom_flag),
                        None => RunOutcome::Exception {
                            message: "no function loaded".to_string(),
                        },
                    },
                    WorkerMessage::Output(_) => continue,
                };
                inbox.reply(outcome);
            }
        }

        *slot.lock().unwrap_or_else(|p| p.into_inner()) = None;
        drop(isolate);
        unsafe {
            let _ = Box::from_raw(cb_data_ptr);
        }
    }));

    if result.is_err() {
        tracing::warn!("V8 worker panicked; dropping it");
    }
}

fn load_function(
    scope: &mut v8::HandleScope,
    module_ref: &str,
    source: &str,
    function_name: &str,
) -> std::result::Result<v8::Global<v8::Function>, String> {
    let tc = &mut v8::TryCatch::new(scope);
    let code = v8::String::new(tc, source).ok_or("Failed to create V8 string")?;
    let Some(script) = v8::Script::compile(tc, code, None) else {
        return Err(format!("{}: {}", module_ref, exception_message(tc)));
    };
    if script.run(tc).is_none() {
        return Err(format!("{}: {}", module_ref, exception_message(tc)));
    }

    let global = tc.get_current_context().global(tc);
    let key = v8::String::new(tc, function_name).ok_or("Failed to create V8 string")?;
    let mut value = global.get(tc, key.into());
    if !value.is_some_and(|v| v.is_function()) {
        // `const` and `let` bindings are not properties of the global object.
        value = v8::Script::compile(tc, key, None).and_then(|s| s.run(tc));
    }
    let Some(value) = value else {
        return Err(format!("'{}' is not defined in {}", function_name, module_ref));
    };
    let function = v8::Local::<v8::Function>::try_from(value)
        .map_err(|_| format!("'{}' in {} is not a function", function_name, module_ref))?;
    Ok(v8::Global::new(tc, function))
}

fn call_function(
    scope: &mut v8::HandleScope,
    function: &v8::Global<v8::Function>,
    args: &Args,
    oom_flag: &AtomicBool,
) -> RunOutcome {
    let scope = &mut v8::HandleScope::new(scope);
    let tc = &mut v8::TryCatch::new(scope);
    let function = v8::Local::new(tc, function);

    let mut argv = Vec::with_capacity(args.len());
    for arg in args {
        let value = match arg {
            Some(v) => json_to_v8(tc, v),
            None => v8::undefined(tc).into(),
        };
        argv.push(value);
    }
    let receiver = v8::undefined(tc).into();

    match function.call(tc, receiver, &argv) {
        Some(value) if value.is_undefined() => RunOutcome::Output { value: None },
        Some(value) => RunOutcome::Output {
            value: Some(v8_to_json(tc, value, 0)),
        },
        None if oom_flag.swap(false, Ordering::SeqCst) => {
            tc.cancel_terminate_execution();
            RunOutcome::Exception {
                message: "Out of memory: V8 heap limit exceeded".to_string(),
            }
        }
        None if tc.has_terminated() => RunOutcome::Exception {
            message: "execution terminated".to_string(),
        },
        None => RunOutcome::Exception {
            message: exception_message(tc),
        },
    }
}

/// The `message` of a thrown `Error`, or the thrown value as a string.
fn exception_message(tc: &mut v8::TryCatch<v8::HandleScope>) -> String {
    let Some(exception) = tc.exception() else {
        return "unknown exception".to_string();
    };
    if exception.is_object() {
        if let (Some(object), Some(key)) = (exception.to_object(tc), v8::String::new(tc, "message")) {
            if let Some(message) = object.get(tc, key.into()) {
                if message.is_string() {
                    return message.to_rust_string_lossy(tc);
                }
            }
        }
    }
    exception.to_rust_string_lossy(tc)
}

// ── JSON <-> V8 ─────────────────────────────────────────────────────────

fn v8_to_json(scope: &mut v8::HandleScope, value: v8::Local<v8::Value>, depth: usize) -> JsonValue {
    if depth > MAX_OUTPUT_DEPTH || value.is_undefined() || value.is_null() {
        JsonValue::Null
    } else if value.is_boolean() {
        JsonValue::Bool(value.boolean_value(scope))
    } else if value.is_number() {
        let num = value.number_value(scope).unwrap_or(0.0);
        if num.fract() == 0.0 && num >= i64::MIN as f64 && num <= i64::MAX as f64 {
            JsonValue::Number(serde_json::Number::from(num as i64))
        } else {
            serde_json::Number::from_f64(num)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null)
        }
    } else if value.is_string() {
        JsonValue::String(value.to_rust_string_lossy(scope))
    } else if let Ok(array) = v8::Local::<v8::Array>::try_from(value) {
        let mut vec = Vec::with_capacity(array.length() as usize);
        for i in 0..array.length() {
            if let Some(elem) = array.get_index(scope, i) {
                vec.push(v8_to_json(scope, elem, depth + 1));
            }
        }
        JsonValue::Array(vec)
    } else if value.is_object() && !value.is_function() {
        let mut map = serde_json::Map::new();
        if let Some(obj) = value.to_object(scope) {
            if let Some(names) = obj.get_own_property_names(scope, v8::GetPropertyNamesArgs::default()) {
                for i in 0..names.length() {
                    let Some(key) = names.get_index(scope, i) else {
                        continue;
                    };
                    let key_str = key.to_rust_string_lossy(scope);
                    if let Some(val) = obj.get(scope, key) {
                        map.insert(key_str, v8_to_json(scope, val, depth + 1));
                    }
                }
            }
        }
        JsonValue::Object(map)
    } else {
        value
            .to_string(scope)
            .map(|s| JsonValue::String(s.to_rust_string_lossy(scope)))
            .unwrap_or(JsonValue::Null)
    }
}

fn json_to_v8<'s>(scope: &mut v8::HandleScope<'s>, value: &JsonValue) -> v8::Local<'s, v8::Value> {
    match value {
        JsonValue::Null => v8::null(scope).into(),
        JsonValue::Bool(b) => v8::Boolean::new(scope, *b).into(),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) => v8::Number::new(scope, f).into(),
            None => v8::undefined(scope).into(),
        },
        JsonValue::String(s) => v8::String::new(scope, s)
            .map(|v| v.into())
            .unwrap_or_else(|| v8::undefined(scope).into()),
        JsonValue::Array(arr) => {
            let v8_array = v8::Array::new(scope, arr.len() as i32);
            for (i, elem) in arr.iter().enumerate() {
                let v8_elem = json_to_v8(scope, elem);
                v8_array.set_index(scope, i as u32, v8_elem);
            }
            v8_array.into()
        }
        JsonValue::Object(map) => {
            let v8_obj = v8::Object::new(scope);
            for (key, val) in map {
                let Some(v8_key) = v8::String::new(scope, key) else {
                    continue;
                };
                let v8_val = json_to_v8(scope, val);
                v8_obj.set(scope, v8_key.into(), v8_val);
            }
            v8_obj.into()
        }
    }
}
