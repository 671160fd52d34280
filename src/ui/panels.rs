use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::color::status_label;
use crate::state::{AppState, InputKind};

// ---------------------------------------------------------------------------
// Left side panel – inputs and chunk table
// ---------------------------------------------------------------------------

/// Render the left panel: loaded inputs, legend and per-chunk diagnostics.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Inputs");
    ui.separator();

    input_line(ui, "Observed", state.observed.as_ref().map(|l| &l.path));
    input_line(ui, "Simulated", state.simulated.as_ref().map(|l| &l.path));
    input_line(ui, "Parameters", state.params.as_ref().map(|l| &l.path));
    ui.add_space(4.0);

    // ---- Status legend ----
    ui.strong("Chunk status");
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for (label, color) in state.colors.legend_entries() {
            ui.label(RichText::new(label).color(color));
        }
    });
    ui.separator();

    let Some(out) = &state.result else {
        ui.label("No stack yet.");
        return;
    };

    // Copy what the table shows so `state` can be mutated on click.
    let rows: Vec<(usize, f64, Option<f64>, Option<f64>, String, Color32)> = out
        .chunks
        .iter()
        .map(|c| {
            (
                c.id,
                c.cfreq,
                c.rms,
                c.weight(),
                status_label(c.flag),
                state.colors.color_for(c.flag),
            )
        })
        .collect();

    let mut clicked = None;
    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .column(Column::auto())
            .columns(Column::auto().at_least(60.0), 3)
            .column(Column::remainder())
            .header(20.0, |mut header| {
                for title in ["id", "MHz", "rms", "weight", "status"] {
                    header.col(|ui: &mut Ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for (id, cfreq, rms, weight, status, color) in rows {
                    body.row(18.0, |mut row| {
                        row.col(|ui: &mut Ui| {
                            let selected = state.selected_chunk == Some(id);
                            if ui.selectable_label(selected, id.to_string()).clicked() {
                                clicked = Some(id);
                            }
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(format!("{cfreq:.4}"));
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(fmt_opt(rms));
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(fmt_opt(weight));
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(RichText::new(status).color(color));
                        });
                    });
                }
            });
    });

    if let Some(id) = clicked {
        state.select_chunk(id);
    }
}

fn input_line(ui: &mut Ui, label: &str, path: Option<&std::path::PathBuf>) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong(label);
        match path.and_then(|p| p.file_name()) {
            Some(name) => ui.label(name.to_string_lossy()),
            None => ui.weak("—"),
        };
    });
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4e}")).unwrap_or_else(|| "—".to_string())
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            for (label, kind) in [
                ("Open observed…", InputKind::Observed),
                ("Open simulated…", InputKind::Simulated),
                ("Open parameters…", InputKind::Params),
            ] {
                if ui.button(label).clicked() {
                    open_file_dialog(state, kind);
                    ui.close_menu();
                }
            }
        });

        ui.separator();

        if ui
            .add_enabled(state.ready(), egui::Button::new("Run stack"))
            .clicked()
        {
            state.run_stack();
        }

        if let Some(out) = &state.result {
            let flagged = out.chunks.iter().filter(|c| c.is_flagged()).count();
            ui.label(format!(
                "{} chunks, {} stacked, {} channels",
                out.chunks.len(),
                out.chunks.len() - flagged,
                out.spectrum.len()
            ));
        }

        ui.separator();

        if ui
            .selectable_label(state.show_sim, "Show simulation")
            .clicked()
        {
            state.show_sim = !state.show_sim;
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState, kind: InputKind) {
    let dialog = match kind {
        InputKind::Params => rfd::FileDialog::new()
            .set_title("Open stacking parameters")
            .add_filter("JSON", &["json"]),
        InputKind::Observed | InputKind::Simulated => rfd::FileDialog::new()
            .set_title(if kind == InputKind::Observed {
                "Open observed spectrum"
            } else {
                "Open simulated spectrum"
            })
            .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
            .add_filter("Parquet", &["parquet", "pq"])
            .add_filter("JSON", &["json"])
            .add_filter("CSV", &["csv"]),
    };

    if let Some(path) = dialog.pick_file() {
        if let Err(e) = state.load(kind, &path) {
            log::error!("Failed to load file: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
