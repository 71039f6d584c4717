// Window Frame Rewriting
//
// Snowflake only accepts RANGE frames bounded by UNBOUNDED or CURRENT ROW,
// so a RANGE frame with a numeric offset becomes a ROWS frame with the same
// bounds. The two agree only when ordering keys are dense and unique.

use super::lexer::{next_significant, Token, TokenKind};
use super::Context;
use crate::models::DiagnosticCode;

/// Rewrite the frame inside an `OVER ( ... )` specification
pub fn rewrite_frame(spec: &[Token], ctx: &mut Context) -> Vec<Token> {
    let mut tokens = spec.to_vec();
    let mut depth = 0usize;

    for i in 0..tokens.len() {
        if tokens[i].is_punct('(') {
            depth += 1;
        } else if tokens[i].is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tokens[i].is_word("RANGE") && has_numeric_bound(&tokens[i + 1..]) {
            tokens[i] = Token {
                kind: TokenKind::Word,
                text: "ROWS".to_string(),
                offset: tokens[i].offset,
            };
            ctx.diagnostics.warn(
                DiagnosticCode::ApproximateSemantics,
                "RANGE frame with numeric bounds rewritten to ROWS; results differ when ordering values repeat or have gaps",
            );
        }
    }

    tokens
}

/// Whether a frame has `<number> PRECEDING` or `<number> FOLLOWING`
fn has_numeric_bound(frame: &[Token]) -> bool {
    frame.iter().enumerate().any(|(i, t)| {
        t.kind == TokenKind::Number
            && next_significant(frame, i + 1)
                .is_some_and(|n| frame[n].is_any_word(&["PRECEDING", "FOLLOWING"]))
    })
}
