use std::path::{Path, PathBuf};

use anyhow::Result;

use molstack::data::loader::{load_params, load_spectrum};
use molstack::{velocity_stack, SpectrumData, StackOutput, StackParams};

use crate::color::StatusColors;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which input a file dialog is filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Observed,
    Simulated,
    Params,
}

/// A loaded input together with the file it came from.
pub struct Loaded<T> {
    pub path: PathBuf,
    pub value: T,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub observed: Option<Loaded<SpectrumData>>,
    pub simulated: Option<Loaded<SpectrumData>>,
    pub params: Option<Loaded<StackParams>>,

    /// Last successful stack.
    pub result: Option<StackOutput>,

    /// Chunk highlighted in the table, by id.
    pub selected_chunk: Option<usize>,

    /// Whether the simulated composite is drawn next to the observed one.
    pub show_sim: bool,

    /// Colours per chunk status.
    pub colors: StatusColors,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            observed: None,
            simulated: None,
            params: None,
            result: None,
            selected_chunk: None,
            show_sim: true,
            colors: StatusColors::new(),
            status_message: None,
        }
    }
}

impl AppState {
    /// Load one input file; a new input invalidates the previous stack.
    pub fn load(&mut self, kind: InputKind, path: &Path) -> Result<()> {
        let path_buf = path.to_path_buf();
        match kind {
            InputKind::Observed => {
                let value = load_spectrum(path)?;
                log::info!("observed spectrum: {} channels", value.len());
                self.observed = Some(Loaded { path: path_buf, value });
            }
            InputKind::Simulated => {
                let value = load_spectrum(path)?;
                log::info!("simulated spectrum: {} channels", value.len());
                self.simulated = Some(Loaded { path: path_buf, value });
            }
            InputKind::Params => {
                let value = load_params(path)?;
                self.params = Some(Loaded { path: path_buf, value });
            }
        }
        self.result = None;
        self.selected_chunk = None;
        self.status_message = None;
        Ok(())
    }

    /// Whether every input needed for a stack is present.
    pub fn ready(&self) -> bool {
        self.observed.is_some() && self.simulated.is_some() && self.params.is_some()
    }

    /// Run the stack on the loaded inputs, keeping the error for display.
    pub fn run_stack(&mut self) {
        let (Some(obs), Some(sim), Some(params)) = (&self.observed, &self.simulated, &self.params)
        else {
            self.status_message = Some("Load observed, simulated and parameter files first".into());
            return;
        };

        let name = obs
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stack")
            .to_string();

        match velocity_stack(&obs.value, &sim.value, &params.value, &name) {
            Ok(out) => {
                let flagged = out.chunks.iter().filter(|c| c.is_flagged()).count();
                log::info!("stacked {} chunks ({flagged} flagged)", out.chunks.len());
                self.result = Some(out);
                self.selected_chunk = None;
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Stack failed: {e}");
                self.result = None;
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Toggle the table selection.
    pub fn select_chunk(&mut self, id: usize) {
        self.selected_chunk = if self.selected_chunk == Some(id) {
            None
        } else {
            Some(id)
        };
    }
}
