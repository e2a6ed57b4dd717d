//! Product listing query composition.
//!
//! Turns the raw query string of `GET /api/products` into a SeaORM select:
//! a filter built from an explicit allow-list of `(field, operator)` pairs,
//! a sort order and a page window.
//!
//! Filter keys use bracket notation, e.g. `category[in]=tee,polo`,
//! `views[gte]=10`, `title[regex]=crew`. A bare `color=red` is equality.

use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::{Expr, SimpleExpr, extension::postgres::PgExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select};

use crate::{
    entity::products::{Column, Entity as Products},
    error::{AppError, AppResult},
};

/// Records skipped per page. Independent of `limit`: page 2 always skips 12.
pub const PAGE_STRIDE: u64 = 12;
pub const DEFAULT_LIMIT: u64 = 13;
pub const MAX_LIMIT: u64 = 100;
/// Highest page whose offset still fits the signed 64-bit OFFSET Postgres binds.
pub const MAX_PAGE: u64 = i64::MAX as u64 / PAGE_STRIDE + 1;

const RESERVED_KEYS: [&str; 3] = ["page", "sort", "limit"];

/// Characters removed from a title search before it reaches the database.
const TITLE_STRIP: [char; 20] = [
    '.', '"', '\'', '`', '!', '*', '-', '+', '=', '{', '}', '?', '^', '$', '(', ')', '|', '[',
    ']', '\\',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Category,
    Size,
    Sleeve,
    Color,
    Title,
    Views,
    Price,
    CreatedAt,
}

impl FilterField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "category" => Some(Self::Category),
            "size" => Some(Self::Size),
            "sleeve" => Some(Self::Sleeve),
            "color" => Some(Self::Color),
            "title" => Some(Self::Title),
            "views" => Some(Self::Views),
            "price" => Some(Self::Price),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    fn allows(self, op: Operator) -> bool {
        let range = matches!(op, Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte);
        match self {
            Self::Category | Self::Size | Self::Sleeve | Self::Color => {
                matches!(op, Operator::Eq | Operator::In)
            }
            Self::Title => matches!(op, Operator::Eq | Operator::Regex),
            Self::Views | Self::Price => op == Operator::Eq || range,
            Self::CreatedAt => range,
        }
    }

    fn column(self) -> Column {
        match self {
            Self::Category => Column::Category,
            Self::Size => Column::Size,
            Self::Sleeve => Column::Sleeve,
            Self::Color => Column::Color,
            Self::Title => Column::Title,
            Self::Views => Column::Views,
            Self::Price => Column::Price,
            Self::CreatedAt => Column::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Regex,
}

impl Operator {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "in" => Some(Self::In),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
    /// Sanitized case-insensitive substring.
    Pattern(String),
    Int(i64),
    Time(DateTime<FixedOffset>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: FilterField,
    pub op: Operator,
    pub value: FilterValue,
}

impl FilterClause {
    fn parse(field: FilterField, op: Operator, raw: &str) -> AppResult<Self> {
        let invalid = || AppError::BadRequest(format!("invalid value for {field:?}: {raw}"));
        let value = match (field, op) {
            (_, Operator::In) => FilterValue::List(raw.split(',').map(str::to_string).collect()),
            (FilterField::Title, Operator::Regex) => FilterValue::Pattern(sanitize_title(raw)),
            (FilterField::Views | FilterField::Price, _) => {
                FilterValue::Int(raw.trim().parse().map_err(|_| invalid())?)
            }
            (FilterField::CreatedAt, _) => {
                FilterValue::Time(DateTime::parse_from_rfc3339(raw.trim()).map_err(|_| invalid())?)
            }
            _ => FilterValue::Text(raw.to_string()),
        };
        Ok(Self { field, op, value })
    }

    fn to_expr(&self) -> SimpleExpr {
        let column = self.field.column();
        match &self.value {
            FilterValue::List(values) => column.is_in(values.iter().cloned()),
            FilterValue::Pattern(pattern) => {
                Expr::col(column).ilike(format!("%{}%", escape_like(pattern)))
            }
            FilterValue::Text(text) => column.eq(text.clone()),
            FilterValue::Int(n) => compare(column, self.op, *n),
            FilterValue::Time(t) => compare(column, self.op, *t),
        }
    }
}

fn compare<V>(column: Column, op: Operator, value: V) -> SimpleExpr
where
    V: Into<sea_orm::Value>,
{
    match op {
        Operator::Gt => column.gt(value),
        Operator::Gte => column.gte(value),
        Operator::Lt => column.lt(value),
        Operator::Lte => column.lte(value),
        _ => column.eq(value),
    }
}

/// Strip characters that would change how a search pattern is interpreted.
pub fn sanitize_title(raw: &str) -> String {
    raw.chars().filter(|c| !TITLE_STRIP.contains(c)).collect()
}

fn escape_like(pattern: &str) -> String {
    pattern.replace('%', "\\%").replace('_', "\\_")
}

/// Split `field[op]` into its parts; a bare `field` has no operator.
fn split_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once('[') {
        Some((field, rest)) => match rest.strip_suffix(']') {
            Some(op) => (field, Some(op)),
            None => (key, None),
        },
        None => (key, None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Views,
    Price,
    Title,
}

impl SortKey {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "createdAt" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "price" => Some(Self::Price),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    fn column(self) -> Column {
        match self {
            Self::CreatedAt => Column::CreatedAt,
            Self::Views => Column::Views,
            Self::Price => Column::Price,
            Self::Title => Column::Title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        }
    }
}

/// Resolve the `sort` parameter into ordered sort keys.
///
/// * absent or empty: newest first, then most viewed
/// * `createdAt:1`: oldest first, nothing else
/// * `field:1` / `field:-1`: that field, then newest first
pub fn parse_sort(raw: Option<&str>) -> AppResult<Vec<(SortKey, Direction)>> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            return Ok(vec![
                (SortKey::CreatedAt, Direction::Desc),
                (SortKey::Views, Direction::Desc),
            ]);
        }
        Some(raw) => raw,
    };
    if raw == "createdAt:1" {
        return Ok(vec![(SortKey::CreatedAt, Direction::Asc)]);
    }

    let invalid = || AppError::BadRequest(format!("invalid sort: {raw}"));
    let (field, direction) = raw.split_once(':').ok_or_else(invalid)?;
    let key = SortKey::parse(field).ok_or_else(invalid)?;
    let direction = match direction {
        "1" => Direction::Asc,
        "-1" => Direction::Desc,
        _ => return Err(invalid()),
    };

    let mut order = vec![(key, direction)];
    if key != SortKey::CreatedAt {
        order.push((SortKey::CreatedAt, Direction::Desc));
    }
    Ok(order)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Page and limit fall back to their defaults when missing, non-numeric
    /// or below one; they never produce an error. Oversized pages clamp to
    /// [`MAX_PAGE`].
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: coerce_positive(page).unwrap_or(1).min(MAX_PAGE),
            limit: coerce_positive(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(PAGE_STRIDE)
    }
}

fn coerce_positive(raw: Option<&str>) -> Option<u64> {
    let n = raw?.trim().parse::<f64>().ok()?;
    (n.is_finite() && n >= 1.0).then(|| n.trunc() as u64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub filters: Vec<FilterClause>,
    pub order: Vec<(SortKey, Direction)>,
    pub window: PageWindow,
}

impl ProductQuery {
    /// Build from raw query-string pairs, in request order.
    pub fn from_params(params: &[(String, String)]) -> AppResult<Self> {
        let first = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        let mut filters = Vec::new();
        for (key, value) in params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let (name, op) = split_key(key);
            let Some(field) = FilterField::parse(name) else {
                tracing::debug!(key = %key, "ignoring unknown product filter");
                continue;
            };
            let op = match op {
                None => Operator::Eq,
                Some(op) => Operator::parse(op).ok_or_else(|| {
                    AppError::BadRequest(format!("unsupported operator in {key}"))
                })?,
            };
            if !field.allows(op) {
                return Err(AppError::BadRequest(format!(
                    "operator {op:?} is not allowed on {name}"
                )));
            }
            filters.push(FilterClause::parse(field, op, value)?);
        }

        Ok(Self {
            filters,
            order: parse_sort(first("sort"))?,
            window: PageWindow::parse(first("page"), first("limit")),
        })
    }

    pub fn condition(&self) -> Condition {
        self.filters
            .iter()
            .fold(Condition::all(), |cond, clause| cond.add(clause.to_expr()))
    }

    /// Matching products without order or paging, used for the total count.
    pub fn filtered(&self) -> Select<Products> {
        Products::find().filter(self.condition())
    }

    pub fn select(&self) -> Select<Products> {
        let ordered = self
            .order
            .iter()
            .fold(self.filtered(), |select, (key, direction)| {
                select.order_by(key.column(), Order::from(*direction))
            });
        ordered
            .offset(self.window.skip())
            .limit(self.window.limit)
    }
}
