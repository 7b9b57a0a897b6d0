//! Raw bindings generated by the build script from `include/*.h`.
#![allow(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    dead_code,
    improper_ctypes,
    clippy::all
)]

pub mod hip {
    include!(concat!(env!("OUT_DIR"), "/hip.rs"));
}

pub mod rocblas {
    include!(concat!(env!("OUT_DIR"), "/rocblas.rs"));
}

pub mod rocsolver {
    include!(concat!(env!("OUT_DIR"), "/rocsolver.rs"));
}

pub mod rocfft {
    include!(concat!(env!("OUT_DIR"), "/rocfft.rs"));
}

pub mod rocsparse {
    include!(concat!(env!("OUT_DIR"), "/rocsparse.rs"));
}

pub mod miopen {
    include!(concat!(env!("OUT_DIR"), "/miopen.rs"));
}

pub mod rocrand {
    include!(concat!(env!("OUT_DIR"), "/rocrand.rs"));
}

pub mod rocprofiler {
    include!(concat!(env!("OUT_DIR"), "/rocprofiler.rs"));
}

pub mod rocwmma {
    include!(concat!(env!("OUT_DIR"), "/rocwmma.rs"));
}
