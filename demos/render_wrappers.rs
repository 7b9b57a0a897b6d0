use rocwrap::preprocess::{Environment, evaluate};
use rocwrap::shim::DEFAULT_WAVEFRONT_SIZE;
use rocwrap::{Result, vendor};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Regenerates include/*.h and shows what each front end ends up seeing.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("include"));

    let host = Environment::bindgen_host();
    let device = Environment::amdgcn_device(DEFAULT_WAVEFRONT_SIZE);

    for wrapper in vendor::wrappers()? {
        let path = wrapper.write_to(&dir)?;
        let text = wrapper.render();

        let parsed = evaluate(&text, &host)?;
        let compiled = evaluate(&text, &device)?;

        println!("{}", path.display());
        println!(
            "  bindgen sees {} injected macros, {} vendor headers",
            parsed.injected().count(),
            parsed.includes().len()
        );
        let leaked: Vec<&str> = compiled
            .injected()
            .filter(|d| d.def.name() != wrapper.include_guard())
            .map(|d| d.def.name())
            .collect();
        println!("  device compile keeps injected: {:?}", leaked);
    }

    Ok(())
}
