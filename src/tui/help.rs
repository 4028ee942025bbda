use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn keybind(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        keybind("Enter", 8, "Look up city (in a list: choose place)"),
        keybind("Tab", 10, "Cycle City / Region / Places"),
        keybind("↑/↓", 10, "Move in the place list (also j/k)"),
        keybind("Backspace", 4, "Delete character"),
        keybind("Ctrl-Y", 7, "Copy forecast to clipboard"),
        keybind("Ctrl-S", 7, "Save forecast as JSON"),
        keybind("F1", 11, "Show this help"),
        keybind("Esc", 10, "Quit (also Ctrl-C)"),
        Line::from(""),
        Line::from("Matching:"),
        Line::from("  City and region are matched exactly and case-sensitively."),
        Line::from("  Leave the region empty to list every place with that name."),
        Line::from(""),
        Line::from(vec![
            Span::raw("  Weather data by "),
            Span::styled("https://open-meteo.com", Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from("Press any key to close."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
