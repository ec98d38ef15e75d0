// Unwatched glue code between a client module and the HTTP library

/// Call `request` from underneath `layers` nested stack frames
#[inline(never)]
pub fn through_layers<R>(layers: usize, request: &dyn Fn() -> R) -> R {
    if layers == 0 {
        return request();
    }
    let response = through_layers(layers - 1, request);
    std::hint::black_box(response)
}
