use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use crate::compose::{Song, SongBook};

/// Footer space reserved for the run summary and key hints.
const FOOTER_HEIGHT: u16 = 3;
/// Width share of the song list.
const LIST_PERCENT: u16 = 30;

/// Read-only browser state over one song book.
pub struct BrowserApp<'a> {
    book: &'a SongBook,
    selected: usize,
}

impl<'a> BrowserApp<'a> {
    pub fn new(book: &'a SongBook) -> Self {
        Self { book, selected: 0 }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn current_song(&self) -> Option<&'a Song> {
        self.book.songs.get(self.selected)
    }

    /// Apply one key press. Returns `true` when the browser should close.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-5),
            KeyCode::PageDown => self.move_selection(5),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.book.songs.len().saturating_sub(1),
            _ => {}
        }
        false
    }

    fn move_selection(&mut self, offset: isize) {
        if self.book.songs.is_empty() {
            return;
        }
        let last = self.book.songs.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
            .split(area);

        if self.book.songs.is_empty() {
            let message = Paragraph::new("No songs were generated.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Song Book"));
            frame.render_widget(message, chunks[0]);
        } else {
            let panes = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(LIST_PERCENT),
                    Constraint::Percentage(100 - LIST_PERCENT),
                ])
                .split(chunks[0]);
            self.draw_song_list(frame, panes[0]);
            self.draw_song(frame, panes[1]);
        }

        self.draw_footer(frame, chunks[1]);
    }

    fn draw_song_list(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .book
            .songs
            .iter()
            .enumerate()
            .map(|(i, song)| ListItem::new(format!("Song {} ({} lines)", i + 1, song.lines.len())))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Songs"))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_song(&self, frame: &mut Frame, area: Rect) {
        let Some(song) = self.current_song() else {
            return;
        };
        let pools = song
            .pools
            .iter()
            .map(|(tag, pool)| format!("{tag}={pool}"))
            .collect::<Vec<_>>()
            .join(" ");
        let title = if pools.is_empty() {
            format!("Song {}", self.selected + 1)
        } else {
            format!("Song {} [{pools}]", self.selected + 1)
        };

        let lines: Vec<Line> = song
            .lines
            .iter()
            .map(|line| Line::from(line.text.clone()))
            .collect();
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let summary = Line::from(Span::styled(
            format!(
                "{} songs from {} attempts over {} pool combinations{}",
                self.book.songs.len(),
                self.book.attempts,
                self.book.combinations,
                if self.book.cancelled { " (cancelled)" } else { "" }
            ),
            Style::default().fg(Color::Green),
        ));
        let instructions = Line::from("[↑/↓ or j/k] Select  [PgUp/PgDn] Jump  [q/Esc] Quit");
        let paragraph = Paragraph::new(vec![summary, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }
}
