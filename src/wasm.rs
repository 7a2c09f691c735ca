//! Browser build support. Panics in WASM otherwise abort silently; the hook forwards the message
//! (including physics or level-loading failures) to the browser console.

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}
