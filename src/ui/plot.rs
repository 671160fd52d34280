use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints, PlotUi, VLine};

use molstack::data::model::Sample;
use molstack::stack::chunk::Chunk;

use crate::state::AppState;

const OBS_COLOR: Color32 = Color32::LIGHT_BLUE;
const SIM_COLOR: Color32 = Color32::from_rgb(230, 120, 60);

// ---------------------------------------------------------------------------
// Stack plot (central panel)
// ---------------------------------------------------------------------------

/// Render the stacked composite and, when a chunk is selected, its raw window.
pub fn stack_plot(ui: &mut Ui, state: &AppState) {
    let Some(out) = &state.result else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Load inputs and run a stack  (File → Open…, Run stack)");
        });
        return;
    };

    let selected = state
        .selected_chunk
        .and_then(|id| out.chunks.iter().find(|c| c.id == id));
    let height = if selected.is_some() {
        ui.available_height() * 0.55
    } else {
        ui.available_height()
    };

    let velocity = out.spectrum.velocity.as_deref().unwrap_or_default();
    Plot::new("stack_plot")
        .legend(Legend::default())
        .height(height)
        .x_axis_label("Velocity (km/s)")
        .y_axis_label("SNR")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            if let Some(snr) = &out.spectrum.snr {
                add_segments(plot_ui, velocity, snr, "stack", OBS_COLOR);
            }
            if state.show_sim {
                if let Some(sim) = &out.spectrum.int_sim {
                    add_segments(plot_ui, velocity, sim, "simulation", SIM_COLOR);
                }
            }
            plot_ui.vline(VLine::new(0.0).color(Color32::DARK_GRAY));
        });

    if let Some(chunk) = selected {
        ui.separator();
        chunk_plot(ui, chunk, state);
    }
}

/// Observed and simulated windows of one chunk on its own velocity axis.
fn chunk_plot(ui: &mut Ui, chunk: &Chunk, state: &AppState) {
    let title = format!("chunk {} at {:.4} MHz", chunk.id, chunk.cfreq);
    Plot::new("chunk_plot")
        .legend(Legend::default())
        .x_axis_label("Velocity (km/s)")
        .y_axis_label("Intensity")
        .show(ui, |plot_ui| {
            let color = state.colors.color_for(chunk.flag);
            add_segments(plot_ui, &chunk.velocity, &chunk.int_obs, &title, color);
            if state.show_sim {
                add_segments(plot_ui, &chunk.sim_velocity, &chunk.int_sim, "simulation", SIM_COLOR);
            }
        });
}

/// Draw `y` against `x` as one line per run of present samples, so missing
/// samples show up as gaps.
fn add_segments(plot_ui: &mut PlotUi, x: &[f64], y: &[Sample], name: &str, color: Color32) {
    let mut run: Vec<[f64; 2]> = Vec::new();
    for (&xi, yi) in x.iter().zip(y) {
        match yi {
            Some(v) => run.push([xi, *v]),
            None if !run.is_empty() => {
                plot_ui.line(segment(std::mem::take(&mut run), name, color));
            }
            None => {}
        }
    }
    if !run.is_empty() {
        plot_ui.line(segment(run, name, color));
    }
}

fn segment(points: Vec<[f64; 2]>, name: &str, color: Color32) -> Line<'static> {
    Line::new(PlotPoints::from(points))
        .name(name)
        .color(color)
        .width(1.5)
}
