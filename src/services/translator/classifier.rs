// Statement Classifier & Dispatcher
//
// Tags each statement with a kind by matching its leading keywords against
// an ordered rule table (most specific first) and routes it to the matching
// transformer. Statements nothing matches are treated as queries.

use super::error::ConversionError;
use super::lexer::{find_top_level, matches_sequence, next_significant, render_trimmed, Token};
use super::{ddl, dml, expression, Context};
use crate::models::StatementKind;

/// Which transformer handles a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    CreateTable,
    CreateView,
    AlterTable,
    DropTable,
    Truncate,
    Insert,
    /// `FROM src INSERT ...` or `FROM src SELECT ...`
    FromFirst,
    Update,
    /// Expression-level rewrites only
    Expression,
    /// Copied through unchanged
    Verbatim,
    Unsupported(&'static str),
}

struct Rule {
    keywords: &'static [&'static str],
    kind: StatementKind,
    route: Route,
}

const fn rule(keywords: &'static [&'static str], kind: StatementKind, route: Route) -> Rule {
    Rule {
        keywords,
        kind,
        route,
    }
}

use StatementKind::*;

static RULES: &[Rule] = &[
    rule(&["CREATE", "TEMPORARY", "EXTERNAL", "TABLE"], DdlCreate, Route::CreateTable),
    rule(&["CREATE", "EXTERNAL", "TABLE"], DdlCreate, Route::CreateTable),
    rule(&["CREATE", "TEMPORARY", "TABLE"], DdlCreate, Route::CreateTable),
    rule(&["CREATE", "TEMP", "TABLE"], DdlCreate, Route::CreateTable),
    rule(&["CREATE", "TABLE"], DdlCreate, Route::CreateTable),
    rule(&["CREATE", "OR", "REPLACE", "VIEW"], DdlCreate, Route::CreateView),
    rule(&["CREATE", "VIEW"], DdlCreate, Route::CreateView),
    rule(&["CREATE", "TEMPORARY", "FUNCTION"], DdlCreate, Route::Unsupported("CREATE FUNCTION")),
    rule(&["CREATE", "FUNCTION"], DdlCreate, Route::Unsupported("CREATE FUNCTION")),
    rule(&["CREATE", "INDEX"], DdlCreate, Route::Unsupported("CREATE INDEX")),
    rule(&["CREATE"], DdlCreate, Route::Expression),
    rule(&["ALTER", "TABLE"], DdlAlter, Route::AlterTable),
    rule(&["ALTER"], DdlAlter, Route::Expression),
    rule(&["DROP", "TABLE"], DdlDrop, Route::DropTable),
    rule(&["DROP", "TEMPORARY", "FUNCTION"], DdlDrop, Route::Unsupported("DROP FUNCTION")),
    rule(&["DROP", "FUNCTION"], DdlDrop, Route::Unsupported("DROP FUNCTION")),
    rule(&["DROP"], DdlDrop, Route::Expression),
    rule(&["TRUNCATE", "TABLE"], DdlDrop, Route::Truncate),
    rule(&["TRUNCATE"], DdlDrop, Route::Truncate),
    rule(&["INSERT", "OVERWRITE", "LOCAL", "DIRECTORY"], DmlInsert, Route::Unsupported("INSERT OVERWRITE DIRECTORY")),
    rule(&["INSERT", "OVERWRITE", "DIRECTORY"], DmlInsert, Route::Unsupported("INSERT OVERWRITE DIRECTORY")),
    rule(&["INSERT"], DmlInsert, Route::Insert),
    rule(&["UPDATE"], DmlUpdate, Route::Update),
    rule(&["DELETE"], DmlUpdate, Route::Expression),
    rule(&["MERGE"], DmlMerge, Route::Expression),
    rule(&["LOAD", "DATA"], Unknown, Route::Unsupported("LOAD DATA")),
    rule(&["MSCK"], Unknown, Route::Unsupported("MSCK REPAIR TABLE")),
    rule(&["ANALYZE", "TABLE"], Unknown, Route::Unsupported("ANALYZE TABLE")),
    rule(&["EXPORT", "TABLE"], Unknown, Route::Unsupported("EXPORT TABLE")),
    rule(&["IMPORT"], Unknown, Route::Unsupported("IMPORT TABLE")),
    rule(&["USE"], Unknown, Route::Verbatim),
    rule(&["SHOW"], Unknown, Route::Verbatim),
    rule(&["DESCRIBE"], Unknown, Route::Verbatim),
    rule(&["DESC"], Unknown, Route::Verbatim),
    rule(&["EXPLAIN"], Unknown, Route::Expression),
    rule(&["SET"], Unknown, Route::Verbatim),
    rule(&["FROM"], Query, Route::FromFirst),
    rule(&["WITH"], Query, Route::Expression),
    rule(&["SELECT"], Query, Route::Expression),
];

/// Assign a kind and a route from the statement's leading keywords
pub fn classify(tokens: &[Token]) -> (StatementKind, Route) {
    let Some(first) = next_significant(tokens, 0) else {
        return (Unknown, Route::Verbatim);
    };

    let (kind, route) = RULES
        .iter()
        .find(|r| matches_sequence(tokens, first, r.keywords).is_some())
        .map(|r| (r.kind, r.route))
        .unwrap_or((Query, Route::Expression));

    // FROM-first and CTE-prefixed statements feeding an INSERT are inserts
    if kind == Query && tokens[first].is_any_word(&["FROM", "WITH"]) {
        if find_top_level(tokens, first, &["INSERT"]).is_some() {
            let route = if route == Route::FromFirst {
                Route::FromFirst
            } else {
                Route::Insert
            };
            return (DmlInsert, route);
        }
    }

    (kind, route)
}

/// Run the transformer for a route. Returns one or more output statements.
pub fn dispatch(route: Route, tokens: &[Token], ctx: &mut Context) -> Result<Vec<String>, ConversionError> {
    tracing::debug!("Statement {} routed to {:?}", ctx.index, route);

    match route {
        Route::CreateTable => ddl::create_table(tokens, ctx).map(|sql| vec![sql]),
        Route::CreateView => ddl::create_view(tokens, ctx).map(|sql| vec![sql]),
        Route::AlterTable => ddl::alter_table(tokens, ctx),
        Route::DropTable => ddl::drop_table(tokens, ctx).map(|sql| vec![sql]),
        Route::Truncate => ddl::truncate_table(tokens, ctx).map(|sql| vec![sql]),
        Route::Insert => dml::insert(tokens, ctx).map(|sql| vec![sql]),
        Route::FromFirst => dml::from_first(tokens, ctx),
        Route::Update => dml::update(tokens, ctx).map(|sql| vec![sql]),
        Route::Expression => expression::translate(tokens, ctx).map(|sql| vec![sql]),
        Route::Verbatim => Ok(vec![render_trimmed(tokens)]),
        Route::Unsupported(construct) => Err(ConversionError::unsupported(ctx.index, construct)),
    }
}
