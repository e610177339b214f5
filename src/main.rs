//! Animated WebP to GIF converter with drag-and-drop

mod convert;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use anyhow::Context as _;
use eframe::egui;

use convert::{worker, ColorDepth, ConversionJob, ConversionReport, FrameRatio};

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([600.0, 500.0])
            .with_resizable(false)
            .with_title("WebP → GIF Converter"),
        ..Default::default()
    };

    eframe::run_native(
        "webp2gif",
        options,
        Box::new(|_cc| Ok(Box::new(ConverterApp::default()))),
    )
}

/// Message from the conversion worker thread
enum WorkerMessage {
    /// Job finished, output written
    Finished(ConversionReport),
    /// Job aborted with a user-facing message
    Failed(String),
}

struct ConverterApp {
    /// Selected input file
    source: Option<PathBuf>,
    /// Palette size for the output
    colors: ColorDepth,
    /// Frame-reduction menu choice
    ratio: FrameRatio,
    /// Output name field; shown in the UI but the real name is derived
    output_name: String,
    /// Status line under the convert button
    status: String,
    /// One job at a time; gates the convert action
    job_running: bool,
    /// Receiver for worker messages
    worker_rx: Option<Receiver<WorkerMessage>>,
    /// Modal error text, if any
    error: Option<String>,
    /// Modal completion notice, if any
    notice: Option<String>,
}

impl Default for ConverterApp {
    fn default() -> Self {
        Self {
            source: None,
            colors: ColorDepth::C128,
            ratio: FrameRatio::Quarter,
            output_name: "output.gif".to_owned(),
            status: "Ready".to_owned(),
            job_running: false,
            worker_rx: None,
            error: None,
            notice: None,
        }
    }
}

impl ConverterApp {
    /// Suffix check only; the container magic is verified by the worker.
    fn select_source(&mut self, path: PathBuf) {
        if convert::is_webp_path(&path) {
            self.status = format!("Selected {}", file_label(&path));
            self.source = Some(path);
        } else {
            self.error = Some("Please choose a valid .webp file".to_owned());
        }
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("WebP animation", &["webp"])
            .pick_file()
        {
            self.select_source(path);
        }
    }

    fn start_conversion(&mut self) {
        if self.job_running {
            return;
        }
        let Some(source) = self.source.clone() else {
            self.error = Some("Select a WebP file first".to_owned());
            return;
        };

        let job = ConversionJob::new(source, self.colors, self.ratio);
        let (tx, rx) = channel();
        self.worker_rx = Some(rx);
        self.job_running = true;
        self.status = "Converting...".to_owned();

        // Fire-and-forget: no cancellation, result arrives as a message.
        thread::spawn(move || run_job(job, tx));
    }

    fn drain_worker_messages(&mut self) {
        if let Some(rx) = &self.worker_rx {
            while let Ok(msg) = rx.try_recv() {
                match msg {
                    WorkerMessage::Finished(report) => {
                        self.job_running = false;
                        self.status = format!(
                            "Done. Frames reduced from {} to {}",
                            report.frames_before, report.frames_kept
                        );
                        self.notice = Some(format!(
                            "Conversion complete.\nWrote {}",
                            report.output.display()
                        ));
                    }
                    WorkerMessage::Failed(message) => {
                        self.job_running = false;
                        self.status = "Ready".to_owned();
                        self.error = Some(message);
                    }
                }
            }
        }
    }

    fn settings_ui(&mut self, ui: &mut egui::Ui) {
        egui::ComboBox::from_label("Color depth")
            .selected_text(self.colors.label())
            .show_ui(ui, |ui| {
                for depth in ColorDepth::ALL {
                    ui.selectable_value(&mut self.colors, depth, depth.label());
                }
            });
        egui::ComboBox::from_label("Frame reduction")
            .selected_text(self.ratio.label())
            .show_ui(ui, |ui| {
                for ratio in FrameRatio::ALL {
                    ui.selectable_value(&mut self.ratio, ratio, ratio.label());
                }
            });
        ui.horizontal(|ui| {
            ui.label("Output name:");
            ui.text_edit_singleline(&mut self.output_name);
        });
        if let Some(source) = &self.source {
            let derived = convert::output_path(source, self.colors, self.ratio);
            ui.label(format!("Will write {}", file_label(&derived)));
        }
    }

    fn modal_windows(&mut self, ctx: &egui::Context) {
        let mut error_dismissed = false;
        if let Some(message) = &self.error {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        error_dismissed = true;
                    }
                });
        }
        if error_dismissed {
            self.error = None;
        }

        let mut notice_dismissed = false;
        if let Some(message) = &self.notice {
            egui::Window::new("Finished")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        notice_dismissed = true;
                    }
                });
        }
        if notice_dismissed {
            self.notice = None;
        }
    }
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Pick up worker results
        self.drain_worker_messages();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(8.0);
                ui.heading("WebP → GIF Converter");
            });
            ui.add_space(8.0);

            ui.group(|ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    match &self.source {
                        Some(path) => ui.label(format!("Selected: {}", file_label(path))),
                        None => ui.label("Drop a .webp file here"),
                    };
                    ui.add_space(4.0);
                    if ui.button("Choose WebP file...").clicked() {
                        self.open_file_dialog();
                    }
                });
            });

            ui.add_space(8.0);
            ui.group(|ui| {
                ui.set_width(ui.available_width());
                ui.label("Conversion settings");
                ui.add_space(4.0);
                self.settings_ui(ui);
            });

            ui.add_space(12.0);
            ui.vertical_centered(|ui| {
                let can_convert = !self.job_running && self.source.is_some();
                if ui
                    .add_enabled(can_convert, egui::Button::new("Convert"))
                    .clicked()
                {
                    self.start_conversion();
                }
                ui.add_space(4.0);
                if self.job_running {
                    ui.spinner();
                }
                ui.label(&self.status);
            });
        });

        self.modal_windows(ctx);

        // Handle file drop
        ctx.input(|i| {
            if !i.raw.dropped_files.is_empty() {
                if let Some(path) = i.raw.dropped_files[0].path.clone() {
                    self.select_source(path);
                }
            }
        });

        // Keep pumping while a job is in flight so its result is picked up
        if self.job_running {
            ctx.request_repaint();
        }
    }
}

fn run_job(job: ConversionJob, tx: Sender<WorkerMessage>) {
    let result = worker::convert(&job)
        .with_context(|| format!("converting {}", job.source.display()));
    let message = match result {
        Ok(report) => WorkerMessage::Finished(report),
        Err(e) => {
            log::warn!("conversion failed: {e:#}");
            WorkerMessage::Failed(format!("{e:#}"))
        }
    };
    let _ = tx.send(message);
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}
