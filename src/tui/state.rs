use crate::error::{OrchestratorError, Stage};
use crate::model::{Forecast, Generation, GeoPoint, Query, WeatherCandidate};
use crate::orchestrator::{Presenter, Progress, UiCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    City,
    Region,
    Choices,
}

/// What the event loop should do after a key press.
#[derive(Debug)]
pub enum KeyOutcome {
    Nothing,
    Send(UiCommand<GeoPoint>),
    CopyForecast,
    SaveForecast,
    Quit,
}

pub struct UiState {
    pub city: String,
    pub region: String,
    pub focus: Focus,
    pub show_help: bool,
    /// Set while a stage call is outstanding; drives the spinner.
    pub busy: Option<String>,
    pub generation: Option<Generation>,
    pub choices: Vec<WeatherCandidate>,
    /// Generation of the lookup that offered `choices`.
    pub choices_generation: Generation,
    pub choice_selected: usize,
    pub forecast: Option<Forecast>,
    pub info: String,
    pub tick: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            city: String::new(),
            region: String::new(),
            focus: Focus::City,
            show_help: false,
            busy: None,
            generation: None,
            choices: Vec::new(),
            choices_generation: Generation::default(),
            choice_selected: 0,
            forecast: None,
            info: "Type a city, optionally a region, then press Enter.".into(),
            tick: 0,
        }
    }
}

impl Presenter<GeoPoint, Forecast> for UiState {
    fn on_progress(&mut self, generation: Generation, progress: Progress<'_, GeoPoint>) {
        self.generation = Some(generation);
        match progress {
            Progress::Resolving(q) => {
                self.choices.clear();
                self.choice_selected = 0;
                self.forecast = None;
                self.busy = Some(format!("Looking up {q}"));
            }
            Progress::Fetching(c) => {
                self.choices.clear();
                self.choice_selected = 0;
                if self.focus == Focus::Choices {
                    self.focus = Focus::City;
                }
                self.busy = Some(format!("Fetching weather for {c}"));
            }
        }
    }

    fn on_ambiguous(&mut self, generation: Generation, candidates: Vec<WeatherCandidate>) {
        self.busy = None;
        self.generation = Some(generation);
        self.choices_generation = generation;
        self.info = format!(
            "{} places match. Choose one with ↑/↓ and Enter.",
            candidates.len()
        );
        self.choices = candidates;
        self.choice_selected = 0;
        self.focus = Focus::Choices;
    }

    fn on_no_match(&mut self, query: &Query) {
        self.busy = None;
        self.info = format!("No results found for {query}.");
    }

    fn on_result(&mut self, detail: Forecast) {
        self.busy = None;
        self.info = format!("Updated at {}", detail.fetched_at_utc);
        self.forecast = Some(detail);
    }

    fn on_error(&mut self, error: &OrchestratorError) {
        // A refused command leaves the running lookup alone.
        if error.stage() != Stage::Selection {
            self.busy = None;
        }
        self.info = format!("Error: {error}");
    }
}

impl UiState {
    pub fn with_inputs(city: String, region: String) -> Self {
        Self {
            city,
            region,
            ..Default::default()
        }
    }

    fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::City => Focus::Region,
            Focus::Region if !self.choices.is_empty() => Focus::Choices,
            Focus::Region | Focus::Choices => Focus::City,
        };
    }

    fn submit(&mut self) -> KeyOutcome {
        let city = self.city.trim();
        if city.is_empty() {
            self.info = "Enter a city name first.".into();
            return KeyOutcome::Nothing;
        }
        KeyOutcome::Send(UiCommand::Submit(Query::new(city, self.region.trim())))
    }

    /// Map a key press to a state change and, possibly, a command.
    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if self.show_help {
            // Any key closes the help overlay.
            self.show_help = false;
            return KeyOutcome::Nothing;
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Esc) => KeyOutcome::Quit,
            (KeyModifiers::CONTROL, KeyCode::Char('y')) => KeyOutcome::CopyForecast,
            (KeyModifiers::CONTROL, KeyCode::Char('s')) => KeyOutcome::SaveForecast,
            (_, KeyCode::F(1)) => {
                self.show_help = true;
                KeyOutcome::Nothing
            }
            (_, KeyCode::Tab) => {
                self.next_focus();
                KeyOutcome::Nothing
            }
            _ => match self.focus {
                Focus::City | Focus::Region => self.on_input_key(key),
                Focus::Choices => self.on_choice_key(key),
            },
        }
    }

    fn on_input_key(&mut self, key: KeyEvent) -> KeyOutcome {
        let field = match self.focus {
            Focus::Region => &mut self.region,
            _ => &mut self.city,
        };
        match key.code {
            KeyCode::Enter => return self.submit(),
            KeyCode::Backspace => {
                field.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => field.push(c),
            _ => {}
        }
        KeyOutcome::Nothing
    }

    fn on_choice_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.choice_selected = self.choice_selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.choice_selected + 1 < self.choices.len() {
                    self.choice_selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(c) = self.choices.get(self.choice_selected) {
                    return KeyOutcome::Send(UiCommand::Select {
                        generation: self.choices_generation,
                        index: self.choice_selected,
                        candidate: c.clone(),
                    });
                }
            }
            _ => {}
        }
        KeyOutcome::Nothing
    }
}
