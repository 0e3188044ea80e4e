//! gesture_classify - Classify the finger-count gesture in one image file.
//!
//! The image goes through the same sampler and classification client as the
//! live loop. The result is printed as JSON on stdout; the status line and
//! overlay placement go to stderr.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use gesture_overlay::ui::{Console, UiMode};
use gesture_overlay::{
    AppState, BackendKind, GestureConfig, OverlayLayout, StatusView, StillImageSource,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Classify the finger-count gesture in an image file"
)]
struct Args {
    /// PNG or JPEG image to classify.
    image: PathBuf,

    /// Use the scripted offline model instead of the remote one.
    #[arg(long)]
    stub_model: bool,

    /// Output style: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut cfg = GestureConfig::load()?;
    if args.stub_model {
        cfg.model.backend = BackendKind::Stub;
    }
    let console = Console::new(
        UiMode::parse(Some(&args.ui)),
        std::io::stderr().is_terminal(),
    );

    let source = StillImageSource::open(&args.image)?;
    let frame = source.frame()?;
    let image = {
        let _stage = console.stage("Encoding frame");
        cfg.sampler()?
            .sample(&frame)?
            .ok_or_else(|| anyhow!("image {} has no pixels", source.path().display()))?
    };

    let mut client = cfg.client()?;
    let result = {
        let _stage = console.stage("Classifying gesture");
        client.classify(&image)
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(layout) =
        OverlayLayout::compute(Some(&result), &cfg.settings, frame.width, frame.height)
    {
        log::info!(
            "overlay box at x={:.0} y={:.0} w={:.0} h={:.0} (mirrored)",
            layout.rect.x,
            layout.rect.y,
            layout.rect.w,
            layout.rect.h
        );
    }

    let mut state = AppState::new();
    state.record(result);
    console.show(
        &StatusView::from_state(&state, &cfg.settings),
        &mut std::io::stderr().lock(),
    )?;
    Ok(())
}
