// src/query.rs

use std::fmt::Display;

use crate::client::ParkClient;
use crate::error::ParkError;
use crate::plot::Plot;

/// Filter, ordering and paging for listing plots from the REST interface.
///
/// Conditions are rendered as `column=op.value` query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotQuery {
    conditions: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    select: Option<String>,
}

impl PlotQuery {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_operator_condition(&mut self, key: &str, operator: &str, value: impl Display) -> &mut Self {
        self.conditions
            .push((key.to_string(), format!("{}.{}", operator, value)));
        self
    }

    /// Adds a constraint that a column must be equal to a value.
    pub fn equal_to<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.add_operator_condition(key, "eq", value)
    }

    pub fn not_equal_to<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.add_operator_condition(key, "neq", value)
    }

    pub fn greater_than<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.add_operator_condition(key, "gt", value)
    }

    pub fn greater_than_or_equal_to<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.add_operator_condition(key, "gte", value)
    }

    pub fn less_than<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.add_operator_condition(key, "lt", value)
    }

    pub fn less_than_or_equal_to<V: Display>(&mut self, key: &str, value: V) -> &mut Self {
        self.add_operator_condition(key, "lte", value)
    }

    /// Case-insensitive pattern match; `*` is the wildcard.
    pub fn ilike(&mut self, key: &str, pattern: &str) -> &mut Self {
        self.add_operator_condition(key, "ilike", pattern)
    }

    /// Case-insensitive substring match.
    pub fn contains(&mut self, key: &str, substring: &str) -> &mut Self {
        self.ilike(key, &format!("*{}*", substring))
    }

    /// Adds a constraint that a column's value is one of `values`.
    pub fn contained_in<V: Display>(&mut self, key: &str, values: &[V]) -> &mut Self {
        let list = values
            .iter()
            .map(|v| quote_list_value(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        self.add_operator_condition(key, "in", format!("({})", list))
    }

    pub fn is_null(&mut self, key: &str) -> &mut Self {
        self.add_operator_condition(key, "is", "null")
    }

    pub fn order_by_ascending(&mut self, key: &str) -> &mut Self {
        self.order.push(format!("{}.asc", key));
        self
    }

    pub fn order_by_descending(&mut self, key: &str) -> &mut Self {
        self.order.push(format!("{}.desc", key));
        self
    }

    pub fn limit(&mut self, count: usize) -> &mut Self {
        self.limit = Some(count);
        self
    }

    pub fn offset(&mut self, count: usize) -> &mut Self {
        self.offset = Some(count);
        self
    }

    /// Restricts the returned columns. Defaults to all columns.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.select = if columns.is_empty() {
            None
        } else {
            Some(columns.join(","))
        };
        self
    }

    pub fn build_query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];
        params.extend(self.conditions.iter().cloned());
        if !self.order.is_empty() {
            params.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }

    /// Retrieves the plots matching this query.
    pub async fn find(&self, client: &ParkClient) -> Result<Vec<Plot>, ParkError> {
        client.list_plots(self).await
    }

    /// Retrieves the first plot matching this query.
    pub async fn first(&self, client: &ParkClient) -> Result<Option<Plot>, ParkError> {
        let mut query = self.clone();
        query.limit(1);
        Ok(client.list_plots(&query).await?.into_iter().next())
    }

    /// Counts the plots matching this query.
    pub async fn count(&self, client: &ParkClient) -> Result<u64, ParkError> {
        client.count_plots(self).await
    }
}

// Values inside `in.(...)` need double quotes when they contain reserved characters.
fn quote_list_value(value: &str) -> String {
    if value
        .chars()
        .any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\' | ' '))
    {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PlotStatus;

    #[test]
    fn default_query_selects_everything() {
        assert_eq!(
            PlotQuery::new().build_query_params(),
            vec![("select".to_string(), "*".to_string())]
        );
    }

    #[test]
    fn builds_filters_order_and_paging() {
        let mut query = PlotQuery::new();
        query
            .equal_to("zone", "A")
            .greater_than("price", 1000)
            .contains("name", "12")
            .order_by_ascending("zone")
            .order_by_descending("price")
            .limit(50)
            .offset(100)
            .select(&["id", "name"]);

        assert_eq!(
            query.build_query_params(),
            vec![
                ("select".to_string(), "id,name".to_string()),
                ("zone".to_string(), "eq.A".to_string()),
                ("price".to_string(), "gt.1000".to_string()),
                ("name".to_string(), "ilike.*12*".to_string()),
                ("order".to_string(), "zone.asc,price.desc".to_string()),
                ("limit".to_string(), "50".to_string()),
                ("offset".to_string(), "100".to_string()),
            ]
        );
    }

    #[test]
    fn in_list_quotes_labels_with_spaces() {
        let mut query = PlotQuery::new();
        query.contained_in("status", &[PlotStatus::Available, PlotStatus::Sold]);
        let params = query.build_query_params();
        assert_eq!(params[1].1, "in.(Trống,\"Đã bán\")");
    }
}
