use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(300);

/// "Analyzing threat intelligence..." shown while a chat reply is outstanding
#[derive(Debug, Clone, Default)]
pub struct TypingIndicator {
    started: Option<Instant>,
}

impl TypingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now: Instant) {
        self.started.get_or_insert(now);
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    /// Follow the session's typing flag
    pub fn sync(&mut self, typing: bool, now: Instant) {
        if typing {
            self.start(now);
        } else {
            self.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }

    /// Animated dots, cycling every 1.2s
    pub fn dots(&self, now: Instant) -> &'static str {
        let Some(started) = self.started else {
            return "";
        };
        let step = now.saturating_duration_since(started).as_millis() / FRAME.as_millis();
        match step % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default()
    }

    pub fn widget(&self, now: Instant) -> TypingLine {
        TypingLine {
            active: self.is_active(),
            dots: self.dots(now),
            seconds: self.elapsed(now).as_secs(),
        }
    }
}

/// One rendered frame of the indicator
pub struct TypingLine {
    active: bool,
    dots: &'static str,
    seconds: u64,
}

impl Widget for TypingLine {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.active || area.height == 0 {
            return;
        }

        let mut spans = vec![
            Span::styled("🛡️ ", Style::default().fg(Color::Green)),
            Span::styled("Analyzing threat intelligence", Style::default().fg(Color::Green)),
            Span::styled(self.dots, Style::default().fg(Color::Yellow)),
        ];
        // Local LLMs can take minutes
        if self.seconds >= 5 {
            spans.push(Span::styled(
                format!(" ({}s)", self.seconds),
                Style::default().fg(Color::DarkGray),
            ));
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dots_cycle_while_active() {
        let t0 = Instant::now();
        let mut indicator = TypingIndicator::new();
        assert_eq!(indicator.dots(t0), "");

        indicator.start(t0);
        assert_eq!(indicator.dots(t0), ".");
        assert_eq!(indicator.dots(t0 + Duration::from_millis(650)), "...");
        assert_eq!(indicator.dots(t0 + Duration::from_millis(1250)), ".");
    }

    #[test]
    fn restarting_keeps_the_original_start() {
        let t0 = Instant::now();
        let mut indicator = TypingIndicator::new();
        indicator.sync(true, t0);
        indicator.sync(true, t0 + Duration::from_secs(3));
        assert_eq!(indicator.elapsed(t0 + Duration::from_secs(4)), Duration::from_secs(4));

        indicator.sync(false, t0 + Duration::from_secs(5));
        assert!(!indicator.is_active());
    }

    #[test]
    fn renders_nothing_when_idle() {
        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        TypingIndicator::new().widget(Instant::now()).render(area, &mut buf);
        assert_eq!(buf, Buffer::empty(area));
    }
}
