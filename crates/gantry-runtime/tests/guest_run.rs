//! End-to-end guest runs against the real driver.
//!
//! Guests are small WAT modules linking the same three import namespaces a
//! production guest artifact does.

use gantry_runtime::{HostDriver, RunConfig, RuntimeError};

fn run(wat: &str) -> Result<(), RuntimeError> {
    HostDriver::new(RunConfig::default()).run_bytes(wat.as_bytes())
}

#[test]
fn allocating_and_logging_guest_completes() {
    run(r#"
        (module
            (import "alloc" "alloc" (func $alloc (param i32 i32) (result i32)))
            (import "alloc" "dealloc" (func $dealloc (param i32 i32 i32)))
            (import "debug" "dblog_ch" (func $dblog_ch (param i32)))
            (import "debug" "dblog_str" (func $dblog_str (param i32 i32)))
            (import "debug" "dblog_flush" (func $dblog_flush))
            (memory (export "memory") 1)
            (data (i32.const 1024) "guest ready")
            (func (export "run") (local $p i32)
                ;; a couple of allocations, one released
                i32.const 24 i32.const 8 call $alloc
                local.set $p
                i32.const 16 i32.const 4 call $alloc
                drop
                local.get $p i32.const 24 i32.const 8 call $dealloc
                ;; one flushed log line
                i32.const 1024 i32.const 11 call $dblog_str
                i32.const 33 call $dblog_ch
                call $dblog_flush))
        "#)
    .unwrap();
}

#[test]
fn realloc_moves_block_contents() {
    run(r#"
        (module
            (import "alloc" "alloc" (func $alloc (param i32 i32) (result i32)))
            (import "alloc" "realloc" (func $realloc (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "run") (local $p i32) (local $q i32)
                i32.const 24 i32.const 8 call $alloc
                local.set $p
                local.get $p i32.const 0xAB i32.store8
                local.get $p i32.const 23 i32.add i32.const 0xCD i32.store8

                local.get $p i32.const 24 i32.const 8 i32.const 48 call $realloc
                local.set $q

                ;; the old prefix must have travelled with the block
                local.get $q i32.load8_u i32.const 0xAB i32.ne
                if unreachable end
                local.get $q i32.const 23 i32.add i32.load8_u i32.const 0xCD i32.ne
                if unreachable end))
        "#)
    .unwrap();
}

#[test]
fn guest_panic_surfaces_structured() {
    let err = run(r#"
        (module
            (import "panic" "panic_str" (func $panic_str (param i32 i32)))
            (import "panic" "panic_ch" (func $panic_ch (param i32)))
            (import "panic" "panic_put_file" (func $panic_put_file (param i32 i32)))
            (import "panic" "panic_put_line_column" (func $panic_put_line_column (param i32 i32)))
            (import "panic" "panic" (func $panic))
            (memory (export "memory") 1)
            (data (i32.const 16) "guest exploded")
            (data (i32.const 64) "src/guest.rs")
            (func (export "run")
                i32.const 16 i32.const 14 call $panic_str
                i32.const 33 call $panic_ch
                i32.const 64 i32.const 12 call $panic_put_file
                i32.const 7 i32.const 3 call $panic_put_line_column
                call $panic
                ;; the terminal call never returns normally
                unreachable))
        "#)
    .unwrap_err();

    let RuntimeError::GuestPanic {
        message,
        file,
        line,
        column,
    } = err
    else {
        panic!("expected a guest panic, got {err}");
    };
    assert_eq!(message, "guest exploded!");
    assert_eq!(file, "src/guest.rs");
    assert_eq!((line, column), (7, 3));
}

#[test]
fn guest_panic_without_fragments_uses_placeholder() {
    let err = run(r#"
        (module
            (import "panic" "panic" (func $panic))
            (memory (export "memory") 1)
            (func (export "run")
                call $panic
                unreachable))
        "#)
    .unwrap_err();

    let RuntimeError::GuestPanic { message, file, .. } = err else {
        panic!("expected a guest panic, got {err}");
    };
    assert_eq!(message, "<no message, ?:0:0>");
    assert_eq!(file, "?");
}

#[test]
fn freeing_unallocated_address_traps_the_run() {
    let err = run(r#"
        (module
            (import "alloc" "dealloc" (func $dealloc (param i32 i32 i32)))
            (memory (export "memory") 1)
            (func (export "run")
                i32.const 64 i32.const 8 i32.const 4 call $dealloc))
        "#)
    .unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::FreeUnallocated { address: 64, .. }
    ));
}

#[test]
fn double_free_traps_the_run() {
    let err = run(r#"
        (module
            (import "alloc" "alloc" (func $alloc (param i32 i32) (result i32)))
            (import "alloc" "dealloc" (func $dealloc (param i32 i32 i32)))
            (memory (export "memory") 1)
            (func (export "run") (local $p i32)
                i32.const 8 i32.const 4 call $alloc
                local.set $p
                local.get $p i32.const 8 i32.const 4 call $dealloc
                local.get $p i32.const 8 i32.const 4 call $dealloc))
        "#)
    .unwrap_err();

    assert!(matches!(err, RuntimeError::FreeAgain { .. }));
}

#[test]
fn contract_violation_is_not_interceptable_by_the_guest() {
    // The guest wraps the faulting call in its own control flow; the host
    // trap still unwinds the whole run.
    let err = run(r#"
        (module
            (import "alloc" "dealloc" (func $dealloc (param i32 i32 i32)))
            (memory (export "memory") 1)
            (func $inner
                i32.const 80 i32.const 8 i32.const 4 call $dealloc)
            (func (export "run")
                block
                    call $inner
                end))
        "#)
    .unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::FreeUnallocated { address: 80, .. }
    ));
}
