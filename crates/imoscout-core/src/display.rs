use crate::db::StoredListing;
use tabled::settings::{object::Columns, Modify, Style, Width};
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct RecordTableRow {
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Price (€)", display_with = "display_right_12")]
    pub price: String,
    #[tabled(rename = "€/m²", display_with = "display_right_8")]
    pub price_per_area: String,
    #[tabled(rename = "Area (m²)", display_with = "display_right_8")]
    pub area: String,
    #[tabled(rename = "City")]
    pub city: String,
    #[tabled(rename = "Region")]
    pub region: String,
}

fn display_right_12(s: &str) -> String {
    format!("{:>12}", s)
}

fn display_right_8(s: &str) -> String {
    format!("{:>8}", s)
}

fn or_na(value: Option<&str>) -> String {
    value.unwrap_or("N/A").to_string()
}

impl RecordTableRow {
    pub fn from_listing(listing: &StoredListing) -> Self {
        let record = &listing.record;
        Self {
            title: record.title.clone(),
            price: or_na(record.price.as_deref()),
            price_per_area: or_na(record.price_per_area.as_deref()),
            area: or_na(record.attribute("Área (m²)")),
            city: or_na(record.city.as_deref()),
            region: or_na(record.region.as_deref()),
        }
    }
}

pub fn create_record_table(listings: &[StoredListing]) -> String {
    let rows: Vec<RecordTableRow> = listings.iter().map(RecordTableRow::from_listing).collect();

    let mut table = Table::new(&rows);
    table
        .with(Style::modern())
        .with(Modify::new(Columns::single(0)).with(Width::truncate(40)))
        .with(Modify::new(Columns::single(1)).with(Width::truncate(12)))
        .with(Modify::new(Columns::single(4)).with(Width::wrap(20)))
        .with(Modify::new(Columns::single(5)).with(Width::wrap(20)));

    table.to_string()
}
