use chisweep::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Bridges the core's progress events onto an indicatif bar. The bar is
/// created hidden and materializes when the sweep phase announces its
/// residue count.
pub fn terminal_progress(quiet: bool) -> (ProgressBar, ProgressCallback<'static>) {
    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::no_length();
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} {msg} [{bar:30}] {pos}/{len} residues",
            )
            .expect("static template is valid")
            .progress_chars("=> "),
        );
        bar
    };

    let handle = bar.clone();
    let callback: ProgressCallback<'static> = Box::new(move |event| match event {
        Progress::PhaseStart { name } => handle.set_message(name),
        Progress::PhaseFinish => {}
        Progress::SweepStart { total_residues } => handle.set_length(total_residues),
        Progress::ResidueDone => handle.inc(1),
        Progress::SweepFinish => handle.finish_and_clear(),
        Progress::Message(text) => handle.set_message(text),
    });

    (bar, callback)
}
