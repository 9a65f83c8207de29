//! chatreel TUI Dashboard Module
//! =============================
//!
//! Terminal rendition of the demo page: scenario selector, phone-style chat
//! pane and the script explanation panel. Uses Ratatui for rendering and
//! receives playback snapshots over a Crossbeam channel.
//!
//! Enable with the `dashboard` feature flag.
//!
//! Features:
//! - Scenario selector with Start / Reset controls (disabled states shown)
//! - Chat pane that auto-scrolls to the newest message
//! - Typing / sending / loading indicators driven by the engine state
//! - Option lists that can be toggled from the keyboard
//! - Live clock in the header (phone edition)

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::catalog::ScenarioCatalog;
use crate::config::{PlayerConfig, Theme};
use crate::driver::PlayerHandle;
use crate::engine::PlaybackSnapshot;
use crate::model::MessageId;
use crate::render::{
    explanations, indicator, render_transcript, Align, Indicator, RenderedBody, RenderedMessage,
    EMPTY_CHAT_PLACEHOLDER, EMPTY_EXPLANATION_PLACEHOLDER, INPUT_PLACEHOLDER,
};

// =============================================================================
// PALETTE
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Palette {
    bot: Color,
    user: Color,
    system: Color,
    accent: Color,
    muted: Color,
    chat_bg: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Midnight => Palette {
            bot: Color::Blue,
            user: Color::Green,
            system: Color::Gray,
            accent: Color::LightBlue,
            muted: Color::DarkGray,
            chat_bg: Color::Reset,
        },
        Theme::Daylight => Palette {
            bot: Color::Black,
            user: Color::Blue,
            system: Color::DarkGray,
            accent: Color::Blue,
            muted: Color::Gray,
            chat_bg: Color::White,
        },
        Theme::Phone => Palette {
            bot: Color::LightBlue,
            user: Color::LightGreen,
            system: Color::Yellow,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            chat_bg: Color::Reset,
        },
    }
}

// =============================================================================
// CHAT DASHBOARD
// =============================================================================

/// What the main loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

/// TUI front end for a running [`crate::driver::PlaybackDriver`].
pub struct ChatDashboard {
    rx: Receiver<PlaybackSnapshot>,
    player: PlayerHandle,
    catalog: Arc<ScenarioCatalog>,
    config: PlayerConfig,
    palette: Palette,
    latest: PlaybackSnapshot,
    /// Highlighted row of the scenario selector
    selector: usize,
    /// Focused option: (message id, option index)
    focus: Option<(MessageId, usize)>,
    frame_count: usize,
}

impl ChatDashboard {
    pub fn new(
        rx: Receiver<PlaybackSnapshot>,
        player: PlayerHandle,
        catalog: Arc<ScenarioCatalog>,
        config: PlayerConfig,
        initial: PlaybackSnapshot,
    ) -> Self {
        let palette = palette(config.theme);
        Self {
            rx,
            player,
            catalog,
            config,
            palette,
            latest: initial,
            selector: 0,
            focus: None,
            frame_count: 0,
        }
    }

    /// Drains pending snapshots, keeping the newest.
    pub fn drain(&mut self) {
        while let Ok(snapshot) = self.rx.try_recv() {
            if snapshot.generation != self.latest.generation {
                self.focus = None;
            }
            self.latest = snapshot;
        }
    }

    /// Run the TUI main loop (blocks until 'q' pressed)
    ///
    /// Sends `Shutdown` to the driver on the way out.
    pub fn run(&mut self) -> io::Result<()> {
        if let Err(e) = enable_raw_mode() {
            let _ = self.player.shutdown();
            return Err(e);
        }
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Stop the driver and restore the terminal even if the loop failed
        let _ = self.player.shutdown();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        loop {
            self.drain();

            terminal.draw(|f| self.ui(f))?;
            self.frame_count += 1;

            // Non-blocking input with a 50ms timeout keeps the typing animation smooth
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code) == KeyOutcome::Quit {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies one key press. Disabled controls are ignored.
    pub fn handle_key(&mut self, code: KeyCode) -> KeyOutcome {
        let sent = match code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyOutcome::Quit,
            KeyCode::Up => {
                self.selector = self.selector.saturating_sub(1);
                Ok(())
            }
            KeyCode::Down => {
                if self.selector + 1 < self.catalog.len() {
                    self.selector += 1;
                }
                Ok(())
            }
            KeyCode::Enter => match self.catalog.scenarios().get(self.selector) {
                Some(scenario) => self.player.select(scenario.id),
                None => Ok(()),
            },
            KeyCode::Char('s') if self.latest.controls.can_start => self.player.start(),
            KeyCode::Char('r') if self.latest.controls.can_reset => self.player.reset(),
            KeyCode::Char('o') => {
                self.focus_next_option();
                Ok(())
            }
            KeyCode::Char(' ') => match self.focused_option() {
                Some((message_id, option_id)) => self.player.toggle(message_id, option_id),
                None => Ok(()),
            },
            _ => Ok(()),
        };

        // Driver gone: nothing left to show
        match sent {
            Ok(()) => KeyOutcome::Continue,
            Err(_) => KeyOutcome::Quit,
        }
    }

    /// Moves focus to the next option across all revealed option lists.
    fn focus_next_option(&mut self) {
        let slots: Vec<(MessageId, usize)> = self
            .latest
            .transcript
            .iter()
            .filter(|m| self.config.features.allows(m.kind()))
            .filter_map(|m| m.options().map(|opts| (m.id, opts.len())))
            .flat_map(|(id, len)| (0..len).map(move |i| (id, i)))
            .collect();

        self.focus = match self.focus.and_then(|f| slots.iter().position(|s| *s == f)) {
            Some(pos) => slots.get((pos + 1) % slots.len()).copied(),
            None => slots.first().copied(),
        };
    }

    fn focused_option(&self) -> Option<(MessageId, String)> {
        let (message_id, index) = self.focus?;
        let msg = self.latest.transcript.iter().find(|m| m.id == message_id)?;
        let option = msg.options()?.get(index)?;
        Some((message_id, option.id.clone()))
    }

    /// Render the UI
    fn ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(10),   // Panels
                Constraint::Length(1), // Footer
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);

        let panels = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Percentage(50),
                Constraint::Percentage(25),
            ])
            .split(chunks[1]);

        self.render_selector(f, panels[0]);
        self.render_phone(f, panels[1]);
        self.render_explanations(f, panels[2]);
        self.render_footer(f, chunks[2]);
    }

    // === HEADER ===
    fn render_header(&self, f: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            "Insurance Planner",
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if self.config.show_clock {
            spans.push(Span::raw("  |  "));
            spans.push(Span::styled(
                chrono::Local::now().format("%H:%M").to_string(),
                Style::default().fg(self.palette.accent),
            ));
        }
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("{}", self.latest.state),
            Style::default().fg(self.palette.muted),
        ));

        let header = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(header, area);
    }

    // === SCENARIO SELECTOR ===
    fn render_selector(&self, f: &mut Frame, area: Rect) {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(3)])
            .split(area);

        let items: Vec<ListItem> = self
            .catalog
            .iter()
            .enumerate()
            .map(|(i, scenario)| {
                let chosen = self.latest.scenario == Some(scenario.id);
                let marker = if i == self.selector { "▶ " } else { "  " };
                let title_style = if chosen {
                    Style::default().fg(self.palette.accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                ListItem::new(vec![
                    Line::from(vec![Span::raw(marker), Span::styled(scenario.title.clone(), title_style)]),
                    Line::from(Span::styled(
                        format!("  {}", scenario.description),
                        Style::default().fg(self.palette.muted),
                    )),
                    Line::raw(""),
                ])
            })
            .collect();

        let list = List::new(items).block(Block::default().title("Select a Scenario").borders(Borders::ALL));
        f.render_widget(list, parts[0]);

        let control = |label: &'static str, enabled: bool, color: Color| {
            let style = if enabled {
                Style::default().fg(color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.palette.muted)
            };
            Span::styled(label, style)
        };
        let controls = Paragraph::new(Line::from(vec![
            control("[s] Start", self.latest.controls.can_start, Color::Green),
            Span::raw("   "),
            control("[r] Reset", self.latest.controls.can_reset, Color::Red),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(controls, parts[1]);
    }

    // === PHONE ===
    fn render_phone(&self, f: &mut Frame, area: Rect) {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(3)])
            .split(area);

        let title = match self.config.theme {
            Theme::Phone => " IP  Insurance Planner · Online ",
            _ => " Insurance Planner ",
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .style(Style::default().bg(self.palette.chat_bg));
        let inner = block.inner(parts[0]);

        let lines = self.chat_lines();
        // Auto-scroll to the newest entry
        let height = wrapped_height(&lines, inner.width);
        let scroll = height.saturating_sub(inner.height);

        let chat = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .block(block);
        f.render_widget(chat, parts[0]);

        let input = Paragraph::new(Span::styled(INPUT_PLACEHOLDER, Style::default().fg(self.palette.muted)))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(input, parts[1]);
    }

    fn chat_lines(&self) -> Vec<Line<'static>> {
        let rendered = render_transcript(&self.latest, &self.config);
        let mut lines = Vec::new();

        if rendered.is_empty() && indicator(&self.latest).is_none() {
            lines.push(
                Line::styled(EMPTY_CHAT_PLACEHOLDER, Style::default().fg(self.palette.muted))
                    .alignment(Alignment::Center),
            );
            return lines;
        }

        for msg in &rendered {
            self.message_lines(msg, &mut lines);
            lines.push(Line::raw(""));
        }

        match indicator(&self.latest) {
            Some(Indicator::Typing(text)) => lines.push(
                Line::styled(format!("{}▌", text), Style::default().fg(self.palette.user))
                    .alignment(Alignment::Right),
            ),
            Some(Indicator::Sending(text)) => lines.push(
                Line::styled(format!("{} (sending…)", text), Style::default().fg(self.palette.user))
                    .alignment(Alignment::Right),
            ),
            Some(Indicator::Loading) => lines.push(
                Line::styled("● ● ●", Style::default().fg(self.palette.bot)).alignment(Alignment::Left),
            ),
            None => {}
        }
        lines
    }

    fn message_lines(&self, msg: &RenderedMessage, lines: &mut Vec<Line<'static>>) {
        let (alignment, color) = match msg.align {
            Align::Left => (Alignment::Left, self.palette.bot),
            Align::Right => (Alignment::Right, self.palette.user),
            Align::Center => (Alignment::Center, self.palette.system),
        };
        let style = Style::default().fg(color);

        let text = match (msg.avatar, msg.align) {
            (Some(avatar), Align::Right) => format!("{}  [{}]", msg.text, avatar),
            (Some(avatar), _) => format!("[{}]  {}", avatar, msg.text),
            (None, _) => msg.text.clone(),
        };
        lines.push(Line::styled(text, style).alignment(alignment));

        match &msg.body {
            RenderedBody::Bubble => {}
            RenderedBody::Checklist { options } => {
                for (i, option) in options.iter().enumerate() {
                    let focused = self.focus == Some((msg.id, i));
                    let mut option_style = if option.selected {
                        Style::default().fg(self.palette.accent).add_modifier(Modifier::BOLD)
                    } else {
                        style
                    };
                    if focused {
                        option_style = option_style.add_modifier(Modifier::REVERSED);
                    }
                    lines.push(Line::styled(option.text(), option_style).alignment(alignment));
                }
            }
            RenderedBody::Table { headers, rows } => {
                lines.push(
                    Line::styled(headers.join(" │ "), style.add_modifier(Modifier::BOLD)).alignment(alignment),
                );
                for row in rows {
                    let row_style = if row.highlighted {
                        Style::default().fg(self.palette.accent).add_modifier(Modifier::BOLD)
                    } else {
                        style
                    };
                    lines.push(Line::styled(row.cells.join(" │ "), row_style).alignment(alignment));
                }
            }
            RenderedBody::Image { uri } => {
                lines.push(
                    Line::styled(format!("[image] {}", uri), style.add_modifier(Modifier::ITALIC))
                        .alignment(alignment),
                );
            }
        }
    }

    // === EXPLANATIONS ===
    fn render_explanations(&self, f: &mut Frame, area: Rect) {
        let entries = explanations(&self.latest);
        let lines: Vec<Line> = if entries.is_empty() {
            vec![Line::styled(EMPTY_EXPLANATION_PLACEHOLDER, Style::default().fg(self.palette.muted))]
        } else {
            entries
                .into_iter()
                .flat_map(|entry| {
                    [
                        Line::styled(entry.heading, Style::default().fg(self.palette.accent).add_modifier(Modifier::BOLD)),
                        Line::raw(entry.explanation),
                        Line::raw(""),
                    ]
                })
                .collect()
        };

        let block = Block::default().title("Script Explanation").borders(Borders::ALL);
        let inner = block.inner(area);
        let scroll = wrapped_height(&lines, inner.width).saturating_sub(inner.height);
        let panel = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .scroll((scroll, 0))
            .block(block);
        f.render_widget(panel, area);
    }

    // === FOOTER ===
    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let footer = Paragraph::new("↑/↓ move · Enter select · s start · r reset · o next option · space toggle · q quit")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(footer, area);
    }
}

/// Approximate rows needed to show `lines` wrapped at `width` columns.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines.iter().map(|line| line.width().max(1).div_ceil(width)).sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

// =============================================================================
// TESTS
// =============================================================================
