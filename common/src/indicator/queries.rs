// SQL catalog for indicator computation
//
// Every query is called with `$1` first local date of the window (inclusive),
// `$2` local date of the window end (exclusive), `$3` orderable code and `$4`
// facility code, and yields a single FLOAT8 column. Balances read at the
// window end may leave `$1` unused.

use crate::models::DataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorQuery {
    pub source: DataSource,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Line items of requisitions for the facility and orderable whose period
/// starts inside the window
macro_rules! requisition_sum {
    ($column:literal) => {
        concat!(
            "SELECT COALESCE(SUM(li.",
            $column,
            "), 0)::float8 AS value
            FROM requisition_line_items li
            JOIN requisitions r ON r.id = li.requisition_id
            JOIN processing_periods pp ON pp.id = r.processing_period_id
            JOIN facilities f ON f.id = r.facility_id
            JOIN orderables o ON o.id = li.orderable_id
            WHERE pp.start_date >= $1
              AND pp.start_date < $2
              AND o.code = $3
              AND f.code = $4"
        )
    };
}

pub static CATALOG: &[IndicatorQuery] = &[
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "beginning balance",
        sql: requisition_sum!("beginning_balance"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "total received quantity",
        sql: requisition_sum!("total_received_quantity"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "total consumed quantity",
        sql: requisition_sum!("total_consumed_quantity"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "total losses and adjustments",
        sql: requisition_sum!("total_losses_and_adjustments"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "total stockout days",
        sql: requisition_sum!("total_stockout_days"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "stock on hand",
        sql: requisition_sum!("stock_on_hand"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "requested quantity",
        sql: requisition_sum!("requested_quantity"),
    },
    IndicatorQuery {
        source: DataSource::Requisition,
        name: "approved quantity",
        sql: requisition_sum!("approved_quantity"),
    },
    IndicatorQuery {
        source: DataSource::StockBased,
        name: "stock on hand",
        sql: "SELECT COALESCE((
                SELECT csoh.stock_on_hand
                FROM calculated_stocks_on_hand csoh
                JOIN stock_cards sc ON sc.id = csoh.stock_card_id
                JOIN facilities f ON f.id = sc.facility_id
                JOIN orderables o ON o.id = sc.orderable_id
                WHERE csoh.occurred_date < $2
                  AND o.code = $3
                  AND f.code = $4
                ORDER BY csoh.occurred_date DESC
                LIMIT 1
            ), 0)::float8 AS value",
    },
    IndicatorQuery {
        source: DataSource::StockBased,
        name: "received",
        sql: "SELECT COALESCE(SUM(li.quantity), 0)::float8 AS value
            FROM stock_card_line_items li
            JOIN stock_cards sc ON sc.id = li.stock_card_id
            JOIN facilities f ON f.id = sc.facility_id
            JOIN orderables o ON o.id = sc.orderable_id
            WHERE li.source_id IS NOT NULL
              AND li.occurred_date >= $1
              AND li.occurred_date < $2
              AND o.code = $3
              AND f.code = $4",
    },
    IndicatorQuery {
        source: DataSource::StockBased,
        name: "consumed",
        sql: "SELECT COALESCE(SUM(li.quantity), 0)::float8 AS value
            FROM stock_card_line_items li
            JOIN stock_cards sc ON sc.id = li.stock_card_id
            JOIN facilities f ON f.id = sc.facility_id
            JOIN orderables o ON o.id = sc.orderable_id
            WHERE li.destination_id IS NOT NULL
              AND li.occurred_date >= $1
              AND li.occurred_date < $2
              AND o.code = $3
              AND f.code = $4",
    },
    IndicatorQuery {
        source: DataSource::StockBased,
        name: "stockout days",
        sql: "SELECT COUNT(DISTINCT csoh.occurred_date)::float8 AS value
            FROM calculated_stocks_on_hand csoh
            JOIN stock_cards sc ON sc.id = csoh.stock_card_id
            JOIN facilities f ON f.id = sc.facility_id
            JOIN orderables o ON o.id = sc.orderable_id
            WHERE csoh.stock_on_hand = 0
              AND csoh.occurred_date >= $1
              AND csoh.occurred_date < $2
              AND o.code = $3
              AND f.code = $4",
    },
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Query registered for `(source, indicator)`, ignoring case, spaces and
/// punctuation in the indicator name
pub fn find(source: DataSource, indicator: &str) -> Option<&'static IndicatorQuery> {
    let wanted = normalize(indicator);
    CATALOG
        .iter()
        .find(|query| query.source == source && normalize(query.name) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_ignores_case_and_separators() {
        let query = find(DataSource::Requisition, "Total_Consumed-Quantity").unwrap();
        assert_eq!(query.name, "total consumed quantity");
    }

    #[test]
    fn test_same_name_differs_by_source() {
        let requisition = find(DataSource::Requisition, "stock on hand").unwrap();
        let stock = find(DataSource::StockBased, "stock on hand").unwrap();
        assert_ne!(requisition.sql, stock.sql);
    }

    #[test]
    fn test_unknown_indicator() {
        assert!(find(DataSource::StockBased, "approved quantity").is_none());
        assert!(find(DataSource::Requisition, "").is_none());
    }

    #[test]
    fn test_every_query_binds_window_end_and_codes() {
        for query in CATALOG {
            for placeholder in ["$2", "$3", "$4"] {
                assert!(
                    query.sql.contains(placeholder),
                    "{} / {} is missing {}",
                    query.source,
                    query.name,
                    placeholder
                );
            }
            assert!(query.sql.contains("float8"));
            assert!(!query.sql.contains("::date"), "{} casts a bound", query.name);
        }
    }

    #[test]
    fn test_catalog_names_are_unique_per_source() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert!(!(a.source == b.source && normalize(a.name) == normalize(b.name)));
            }
        }
    }
}
