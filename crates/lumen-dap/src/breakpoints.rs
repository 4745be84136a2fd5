use std::sync::Arc;

use lumen_rdp::{ActorName, BreakpointActor, Position};

/// One breakpoint as desired by the editor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BreakpointRequest {
    pub line: u32,
    pub column: Option<u32>,
    /// Expression that must evaluate truthy for the breakpoint to pause.
    pub condition: Option<String>,
    /// Logpoint template with `{expr}` placeholders; logs instead of pausing.
    pub log_message: Option<String>,
}

impl BreakpointRequest {
    pub fn at_line(line: u32) -> Self {
        Self {
            line,
            column: None,
            condition: None,
            log_message: None,
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_log_message(mut self, log_message: impl Into<String>) -> Self {
        self.log_message = Some(log_message.into());
        self
    }

    pub fn key(&self) -> EquivalenceKey {
        EquivalenceKey {
            line: self.line,
            column: self.column,
            condition: self.condition.clone(),
            log_message: self.log_message.clone(),
        }
    }

    pub fn requested_position(&self) -> Position {
        Position::new(self.line, self.column.unwrap_or(0))
    }
}

/// Identity of a breakpoint for reconciliation purposes.
///
/// Keyed on the *full* request: two descriptors are the same breakpoint iff
/// line, column, condition and log message all match. A changed condition at
/// an unchanged position is a different breakpoint, so reconciliation
/// replaces it (delete-then-add) rather than leaving the stale one in place.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquivalenceKey {
    line: u32,
    column: Option<u32>,
    condition: Option<String>,
    log_message: Option<String>,
}

/// One desired breakpoint, refined by reconciliation into a runtime one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakpointDescriptor {
    pub request: BreakpointRequest,
    /// Where the breakpoint actually landed. Populated only after a
    /// successful install.
    pub actual: Option<Position>,
}

impl BreakpointDescriptor {
    pub fn new(request: BreakpointRequest) -> Self {
        Self {
            request,
            actual: None,
        }
    }

    pub fn key(&self) -> EquivalenceKey {
        self.request.key()
    }
}

/// Runtime-side record that a descriptor has been applied.
///
/// Created only by a successful install; destroyed by explicit deletion or
/// when the owning source goes away.
#[derive(Clone)]
pub struct InstalledBreakpoint {
    pub descriptor: BreakpointDescriptor,
    pub handle: InstalledHandle,
}

impl InstalledBreakpoint {
    /// Remote actor name for legacy installs; the modern variant has no
    /// per-breakpoint actor.
    pub fn actor_name(&self) -> Option<&ActorName> {
        match &self.handle {
            InstalledHandle::Legacy(actor) => Some(actor.name()),
            InstalledHandle::Modern(_) => None,
        }
    }

    /// Installed runtime position for modern-variant handles.
    pub fn modern_position(&self) -> Option<Position> {
        match self.handle {
            InstalledHandle::Legacy(_) => None,
            InstalledHandle::Modern(position) => Some(position),
        }
    }
}

#[derive(Clone)]
pub enum InstalledHandle {
    /// Dedicated remote breakpoint actor (legacy variant).
    Legacy(Arc<dyn BreakpointActor>),
    /// The modern variant keys removal by the installed position.
    Modern(Position),
}

/// Snap a requested position to the nearest valid position at or after it.
///
/// Picks the candidate with the smallest line ≥ the requested line; on that
/// line, the smallest column ≥ the requested column; if no column on the
/// requested line qualifies, the first candidate on the next available line.
/// Returns `None` only when no candidate lies at or after the request.
pub fn find_next_valid_position(
    requested: Position,
    candidates: &[Position],
) -> Option<Position> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let idx = sorted.partition_point(|p| p.line < requested.line);
    let tail = &sorted[idx..];
    let first = *tail.first()?;

    if first.line == requested.line {
        if let Some(p) = tail
            .iter()
            .take_while(|p| p.line == requested.line)
            .find(|p| p.column >= requested.column)
        {
            return Some(*p);
        }
        return tail.iter().copied().find(|p| p.line > requested.line);
    }

    Some(first)
}

/// Convert a `{expr}` logpoint template into a condition expression that
/// logs and never pauses.
///
/// Protocol variants without native logpoint support still have a condition
/// slot; `console.log` evaluates for its side effect and the trailing
/// `false` keeps the thread running.
pub fn log_message_to_expression(template: &str) -> String {
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        push_escaped(&mut literal, &rest[..open]);
        literal.push_str("${");
        literal.push_str(&rest[open + 1..open + close]);
        literal.push('}');
        rest = &rest[open + close + 1..];
    }
    push_escaped(&mut literal, rest);

    format!("console.log(`{literal}`) && false")
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(line, column)
    }

    #[test]
    fn equivalence_key_covers_every_requested_field() {
        let base = BreakpointRequest::at_line(10).with_column(4);

        assert_eq!(base.key(), base.clone().key());
        assert_ne!(base.key(), BreakpointRequest::at_line(11).with_column(4).key());
        assert_ne!(base.key(), BreakpointRequest::at_line(10).with_column(5).key());
        assert_ne!(base.key(), base.clone().with_condition("x > 1").key());
        assert_ne!(base.key(), base.clone().with_log_message("x = {x}").key());
        assert_ne!(
            base.clone().with_condition("x > 1").key(),
            base.with_condition("x > 2").key()
        );
    }

    #[test]
    fn snaps_to_same_line_minimal_column() {
        let candidates = [pos(5, 8), pos(5, 2), pos(7, 0)];
        assert_eq!(
            find_next_valid_position(pos(5, 3), &candidates),
            Some(pos(5, 8))
        );
        assert_eq!(
            find_next_valid_position(pos(5, 0), &candidates),
            Some(pos(5, 2))
        );
    }

    #[test]
    fn falls_back_to_first_candidate_on_next_line() {
        let candidates = [pos(5, 2), pos(7, 4), pos(7, 1)];
        // No column >= 9 on line 5; first candidate of the next line wins.
        assert_eq!(
            find_next_valid_position(pos(5, 9), &candidates),
            Some(pos(7, 1))
        );
        // Requested line has no candidates at all.
        assert_eq!(
            find_next_valid_position(pos(6, 0), &candidates),
            Some(pos(7, 1))
        );
    }

    #[test]
    fn no_candidate_at_or_after_request() {
        let candidates = [pos(3, 0)];
        assert_eq!(find_next_valid_position(pos(5, 0), &candidates), None);
        assert_eq!(find_next_valid_position(pos(1, 0), &[]), None);
    }

    #[test]
    fn logpoint_template_becomes_logging_condition() {
        assert_eq!(
            log_message_to_expression("x is {x}, y is {obj.y}"),
            "console.log(`x is ${x}, y is ${obj.y}`) && false"
        );
        assert_eq!(
            log_message_to_expression("plain text"),
            "console.log(`plain text`) && false"
        );
        // Backticks and interpolation metacharacters in the literal part
        // must not escape the template literal.
        assert_eq!(
            log_message_to_expression("cost: $5 `quoted`"),
            "console.log(`cost: \\$5 \\`quoted\\``) && false"
        );
    }

    #[test]
    fn unterminated_placeholder_is_kept_literal() {
        assert_eq!(
            log_message_to_expression("broken {x"),
            "console.log(`broken {x`) && false"
        );
    }
}
