//! Guest module fixtures.
//!
//! | Fixture | Exports | Imports from `extism:host/user` |
//! |---------|---------|--------------------------------|
//! | [`echo_module`] | `echo`, `nothing`, `count_vowels`, `get_config`, `fail`, `fail_silently`, `spin` | none |
//! | [`host_call_module`] | `call_host` | `transform(i64) -> i64` (namespace configurable) |
//! | [`scalar_host_module`] | `mix` | `mix(i32, i64, f32, f64) -> f64` |

/// Kernel imports used by the fixtures.
const KERNEL_IMPORTS: &str = r#"
  (import "extism:host/env" "input_length" (func $input_length (result i64)))
  (import "extism:host/env" "input_load_u8" (func $input_load_u8 (param i64) (result i32)))
  (import "extism:host/env" "alloc" (func $alloc (param i64) (result i64)))
  (import "extism:host/env" "length" (func $length (param i64) (result i64)))
  (import "extism:host/env" "store_u8" (func $store_u8 (param i64 i32)))
  (import "extism:host/env" "store_u64" (func $store_u64 (param i64 i64)))
  (import "extism:host/env" "output_set" (func $output_set (param i64 i64)))
  (import "extism:host/env" "error_set" (func $error_set (param i64)))
  (import "extism:host/env" "config_get" (func $config_get (param i64) (result i64)))
"#;

/// Copies the call input into a fresh kernel block and returns its offset.
const COPY_INPUT: &str = r#"
  (func $copy_input (result i64)
    (local $len i64) (local $offs i64) (local $i i64)
    (local.set $len (call $input_length))
    (local.set $offs (call $alloc (local.get $len)))
    (block $done
      (loop $next
        (br_if $done (i64.ge_u (local.get $i) (local.get $len)))
        (call $store_u8
          (i64.add (local.get $offs) (local.get $i))
          (call $input_load_u8 (local.get $i)))
        (local.set $i (i64.add (local.get $i) (i64.const 1)))
        (br $next)))
    (local.get $offs))
"#;

/// WAT source of the echo module.
#[must_use]
pub fn echo_wat() -> String {
    format!(
        r#"(module
{KERNEL_IMPORTS}
{COPY_INPUT}
  (func $is_vowel (param $c i32) (result i32)
    (i32.or
      (i32.or
        (i32.or (i32.eq (local.get $c) (i32.const 97)) (i32.eq (local.get $c) (i32.const 101)))
        (i32.or (i32.eq (local.get $c) (i32.const 105)) (i32.eq (local.get $c) (i32.const 111))))
      (i32.eq (local.get $c) (i32.const 117))))

  (func (export "echo") (result i32)
    (call $output_set (call $copy_input) (call $input_length))
    (i32.const 0))

  (func (export "nothing") (result i32)
    (i32.const 0))

  (func (export "count_vowels") (result i32)
    (local $len i64) (local $i i64) (local $count i64) (local $out i64)
    (local.set $len (call $input_length))
    (block $done
      (loop $next
        (br_if $done (i64.ge_u (local.get $i) (local.get $len)))
        (if (call $is_vowel (i32.or (call $input_load_u8 (local.get $i)) (i32.const 32)))
          (then (local.set $count (i64.add (local.get $count) (i64.const 1)))))
        (local.set $i (i64.add (local.get $i) (i64.const 1)))
        (br $next)))
    (local.set $out (call $alloc (i64.const 8)))
    (call $store_u64 (local.get $out) (local.get $count))
    (call $output_set (local.get $out) (i64.const 8))
    (i32.const 0))

  (func (export "get_config") (result i32)
    (local $value i64)
    (local.set $value (call $config_get (call $copy_input)))
    (if (i64.ne (local.get $value) (i64.const 0))
      (then (call $output_set (local.get $value) (call $length (local.get $value)))))
    (i32.const 0))

  (func (export "fail") (result i32)
    (call $error_set (call $copy_input))
    (i32.const 1))

  (func (export "fail_silently") (result i32)
    (i32.const 7))

  (func (export "spin") (result i32)
    (loop $forever
      (br $forever))
    (i32.const 0))
)"#
    )
}

/// WAT source of a module whose `call_host` export passes its input to the
/// host function `transform` imported from `namespace` and outputs whatever
/// block the host returns.
#[must_use]
pub fn host_call_wat(namespace: &str) -> String {
    format!(
        r#"(module
{KERNEL_IMPORTS}
  (import "{namespace}" "transform" (func $transform (param i64) (result i64)))
{COPY_INPUT}
  (func (export "call_host") (result i32)
    (local $out i64)
    (local.set $out (call $transform (call $copy_input)))
    (if (i64.ne (local.get $out) (i64.const 0))
      (then (call $output_set (local.get $out) (call $length (local.get $out)))))
    (i32.const 0))
)"#
    )
}

/// WAT source of a module whose `mix` export calls the host `mix` with
/// `(2, 40, 0.5, 0.25)` and outputs the returned `f64` as 8 little-endian
/// bytes.
#[must_use]
pub fn scalar_host_wat() -> String {
    format!(
        r#"(module
{KERNEL_IMPORTS}
  (import "extism:host/user" "mix" (func $mix (param i32 i64 f32 f64) (result f64)))
  (func (export "mix") (result i32)
    (local $out i64)
    (local.set $out (call $alloc (i64.const 8)))
    (call $store_u64
      (local.get $out)
      (i64.reinterpret_f64
        (call $mix (i32.const 2) (i64.const 40) (f32.const 0.5) (f64.const 0.25))))
    (call $output_set (local.get $out) (i64.const 8))
    (i32.const 0))
)"#
    )
}

/// Compile WebAssembly text into a binary module.
///
/// # Panics
///
/// Panics if the fixture is not valid WAT.
#[must_use]
pub fn compile(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).expect("fixture WAT must compile")
}

/// The echo module as a binary.
#[must_use]
pub fn echo_module() -> Vec<u8> {
    compile(&echo_wat())
}

/// The host-call module importing `transform` from `namespace`.
#[must_use]
pub fn host_call_module(namespace: &str) -> Vec<u8> {
    compile(&host_call_wat(namespace))
}

/// The scalar host-call module.
#[must_use]
pub fn scalar_host_module() -> Vec<u8> {
    compile(&scalar_host_wat())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

    #[test]
    fn fixtures_compile() {
        for wasm in [
            echo_module(),
            host_call_module("extism:host/user"),
            host_call_module("custom"),
            scalar_host_module(),
        ] {
            assert_eq!(wasm[..4], WASM_MAGIC);
        }
    }

    #[test]
    fn host_call_namespace_is_spliced() {
        assert!(host_call_wat("custom").contains(r#"(import "custom" "transform""#));
    }
}
