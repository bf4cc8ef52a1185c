use sea_query::*;

/// the whisky table
#[derive(Iden)]
pub enum Whiskies {
    Table,
    Id,
    Distillery,
    Country,
    Region,
    WhiskyName,
    BatchCode,
    Age,
    BottlingYear,
    Abv,
    CaskType,
    PhotoPath,
    DistilleryFolded,
    RegionFolded,
    WhiskyNameFolded,
}

/// Builds a select over the whisky table, filtered by the given text.
///
/// The text may appear anywhere in the name, distillery, or region. Case is
/// ignored by comparing against the lowercased `*_folded` columns, since
/// SQLite's own `LIKE` only folds ASCII.
#[tracing::instrument]
pub fn whisky_search(text: Option<&str>) -> SelectStatement {
    let mut select = Query::select();
    select.column(Asterisk).from(Whiskies::Table);

    if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
        tracing::debug!("Looking for whiskies containing: `{text}`");
        let pattern = contains_pattern(&super::fold(text));
        let contains = |column: Whiskies| {
            Expr::col(column).like(LikeExpr::new(&pattern).escape('\\'))
        };

        select.cond_where(
            Cond::any()
                .add(contains(Whiskies::WhiskyNameFolded))
                .add(contains(Whiskies::DistilleryFolded))
                .add(contains(Whiskies::RegionFolded)),
        );
    }

    select
        .order_by(Whiskies::WhiskyName, Order::Asc)
        .order_by(Whiskies::Id, Order::Asc);
    select
}

/// Wraps user text in wildcards, escaping the wildcards it already has.
fn contains_pattern(text: &str) -> String {
    let mut s = String::with_capacity(text.len() + 2);

    // IMPORTANT! this does the 'anywhere in the string' checking in SQLite
    s.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            s.push('\\');
        }
        s.push(c);
    }
    s.push('%');
    s
}
