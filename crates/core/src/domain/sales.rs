use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::invoice::InvoiceHeader;
use crate::errors::DomainError;

pub const ERP_DATE_FORMAT: &str = "%Y/%m/%d";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub invoice_count: usize,
    pub previous_revenue: Decimal,
}

impl SalesSummary {
    /// Aggregates invoice headers covering `date` and the day before it.
    /// Cancelled invoices and invoices dated outside the two days are ignored.
    pub fn aggregate(date: NaiveDate, invoices: &[InvoiceHeader]) -> Self {
        let previous = previous_day(date);
        let mut summary = Self {
            date,
            revenue: Decimal::ZERO,
            invoice_count: 0,
            previous_revenue: Decimal::ZERO,
        };

        for invoice in invoices.iter().filter(|invoice| !invoice.cancelled) {
            match invoice.document_date {
                Some(day) if day == date => {
                    summary.revenue += invoice.total;
                    summary.invoice_count += 1;
                }
                Some(day) if day == previous => summary.previous_revenue += invoice.total,
                _ => {}
            }
        }

        summary
    }

    pub fn difference(&self) -> Decimal {
        self.revenue - self.previous_revenue
    }

    pub fn previous_date(&self) -> NaiveDate {
        previous_day(self.date)
    }
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(Duration::days(1)).unwrap_or(date)
}

pub fn format_erp_date(date: NaiveDate) -> String {
    date.format(ERP_DATE_FORMAT).to_string()
}

/// Resolves the date argument of a sales request relative to `today`.
/// Missing, blank and `today` mean today; `yesterday` means the day before;
/// otherwise `YYYY/MM/DD` or `YYYY-MM-DD` is expected.
pub fn resolve_sales_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, DomainError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(today);
    };

    match raw.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(previous_day(today)),
        _ => {}
    }

    NaiveDate::parse_from_str(raw, ERP_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| DomainError::UnreadableDate(raw.to_owned()))
}
