mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::config::Settings;
use crate::model::{GeoPoint, Query, WeatherEvent};
use crate::orchestrator::{self, dispatch, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Terminal,
};
use state::{Focus, KeyOutcome, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub async fn run(args: Cli, settings: Settings) -> Result<()> {
    let source = crate::cli::build_source(&settings)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<WeatherEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand<GeoPoint>>();

    let city = args.city.clone().unwrap_or_default();
    if !city.trim().is_empty() {
        let _ = cmd_tx.send(UiCommand::Submit(Query::new(city.trim(), args.region.trim())));
    }

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(source, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<WeatherEvent>,
    cmd_tx: UnboundedSender<UiCommand<GeoPoint>>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only.
    let mut state = UiState::with_inputs(
        args.city.clone().unwrap_or_default(),
        args.region.clone(),
    );

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            dispatch(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match state.on_key(k) {
                    KeyOutcome::Nothing => {}
                    KeyOutcome::Send(cmd) => {
                        if cmd_tx.send(cmd).is_err() {
                            break Err(anyhow::anyhow!("controller stopped unexpectedly"));
                        }
                    }
                    KeyOutcome::CopyForecast => match state.forecast.as_ref() {
                        Some(fc) => {
                            state.info = match export::copy_forecast(fc) {
                                Ok(()) => "Copied forecast to clipboard".into(),
                                Err(e) => format!("Copy failed: {e:#}"),
                            };
                        }
                        None => state.info = "Nothing to copy yet".into(),
                    },
                    KeyOutcome::SaveForecast => match state.forecast.as_ref() {
                        Some(fc) => {
                            state.info =
                                match export::save_forecast(fc, args.export_json.as_deref()) {
                                    Ok(p) => format!("Saved: {}", p.display()),
                                    Err(e) => format!("Save failed: {e:#}"),
                                };
                        }
                        None => state.info = "Nothing to save yet".into(),
                    },
                    KeyOutcome::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
                // Redraw right away so typing does not lag behind the tick.
                terminal.draw(|f| draw(f.area(), f, &state)).ok();
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // City + Region inputs
                Constraint::Min(0),    // Place list or forecast
                Constraint::Length(3), // Status row
            ]
            .as_ref(),
        )
        .split(area);

    draw_inputs(main[0], f, state);

    if state.choices.is_empty() {
        draw_forecast(main[1], f, state);
    } else {
        draw_choices(main[1], f, state);
    }

    draw_status(main[2], f, state);

    if state.show_help {
        help::draw_help(centered(area, 70, 20), f);
    }
}

fn draw_inputs(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(area);

    let cursor = |focused: bool| if focused { "_" } else { "" };

    let city_focused = state.focus == Focus::City;
    let city = Paragraph::new(format!("{}{}", state.city, cursor(city_focused))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(city_focused))
            .title("City"),
    );
    f.render_widget(city, row[0]);

    let region_focused = state.focus == Focus::Region;
    let region = Paragraph::new(format!("{}{}", state.region, cursor(region_focused))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(region_focused))
            .title("Region (optional)"),
    );
    f.render_widget(region, row[1]);
}

fn draw_choices(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let items: Vec<ListItem> = state
        .choices
        .iter()
        .map(|c| ListItem::new(crate::text_summary::describe_candidate(c)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(state.focus == Focus::Choices))
                .title(format!("Choose a place ({} matches)", state.choices.len())),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut list_state = ListState::default();
    list_state.select(Some(state.choice_selected));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_forecast(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Current Weather");

    let Some(fc) = state.forecast.as_ref() else {
        let hint = Paragraph::new(vec![
            Line::from(""),
            Line::from("  Enter a city and press Enter."),
            Line::from(vec![
                Span::raw("  Press "),
                Span::styled("F1", Style::default().fg(Color::Magenta)),
                Span::raw(" for help."),
            ]),
        ])
        .block(block);
        f.render_widget(hint, area);
        return;
    };

    let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::Gray));
    let value = |s: String, color: Color| Span::styled(s, Style::default().fg(color));

    let lines = vec![
        Line::from(Span::styled(
            crate::text_summary::location_title(fc),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            label("Observed:      "),
            Span::raw(format!("{} ({})", fc.observed_at, fc.timezone)),
        ]),
        Line::from(""),
        Line::from(vec![
            label("Temperature:   "),
            value(fc.temperature.to_string(), Color::Yellow),
        ]),
        Line::from(vec![
            label("Conditions:    "),
            value(fc.conditions.clone(), Color::Green),
        ]),
        Line::from(vec![
            label("Cloud Cover:   "),
            Span::raw(fc.cloud_cover.to_string()),
        ]),
        Line::from(vec![
            label("Precipitation: "),
            Span::raw(fc.precipitation.to_string()),
        ]),
        Line::from(vec![
            label("Pressure:      "),
            Span::raw(fc.surface_pressure.to_string()),
        ]),
        Line::from(vec![
            label("Wind:          "),
            value(
                format!(
                    "{} from {} ({})",
                    fc.wind_speed,
                    crate::text_summary::compass_point(fc.wind_direction.value),
                    fc.wind_direction
                ),
                Color::Blue,
            ),
        ]),
        Line::from(vec![
            label("Gusts:         "),
            Span::raw(fc.wind_gusts.to_string()),
        ]),
        Line::from(vec![
            label("Daylight:      "),
            Span::raw(if fc.is_day { "yes" } else { "no" }),
        ]),
    ];

    let p = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut spans = Vec::new();
    if let Some(busy) = state.busy.as_deref() {
        spans.push(Span::styled(
            format!("{} ", SPINNER[state.tick % SPINNER.len()]),
            Style::default().fg(Color::Yellow),
        ));
        spans.push(Span::raw(format!("{busy}…")));
    } else if state.info.starts_with("Error") {
        spans.push(Span::styled(
            state.info.clone(),
            Style::default().fg(Color::Red),
        ));
    } else {
        spans.push(Span::raw(state.info.clone()));
    }

    let title = match state.generation {
        Some(g) => format!("Status (lookup {g})"),
        None => "Status".to_string(),
    };
    let p = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

/// A rectangle of at most `width` x `height`, centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
