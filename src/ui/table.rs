use tabled::{settings::Style, Table, Tabled};
use crate::customer::Customer;
use crate::license::License;
use crate::storage::DbStats;

#[derive(Tabled)]
pub struct CustomerTableRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Licenses")]
    pub licenses: String,
}

#[derive(Tabled)]
pub struct LicenseTableRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Serial")]
    pub serial: String,
    #[tabled(rename = "Customer")]
    pub customer: String,
}

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn customers_table(customers: &[Customer]) -> String {
    let rows: Vec<CustomerTableRow> = customers
        .iter()
        .map(|c| {
            let mut ids: Vec<&str> = c.licenses.iter().map(|l| l.id.as_str()).collect();
            ids.sort_unstable();
            CustomerTableRow {
                id: c.id.clone(),
                name: c.name.clone(),
                licenses: ids.join(", "),
            }
        })
        .collect();
    render(&rows)
}

pub fn licenses_table(licenses: &[License]) -> String {
    let rows: Vec<LicenseTableRow> = licenses
        .iter()
        .map(|l| LicenseTableRow {
            id: l.id.clone(),
            serial: l.serial.clone(),
            customer: l.customer_id.clone(),
        })
        .collect();
    render(&rows)
}

pub fn stats_table(stats: &DbStats) -> String {
    let rows = vec![
        TableRow { metric: "Customers".to_string(), value: stats.customers.to_string() },
        TableRow { metric: "Licenses".to_string(), value: stats.licenses.to_string() },
    ];
    render(&rows)
}
