use rust_xlsxwriter::{Workbook, Worksheet};

use crate::domain::listing::ListingRow;
use crate::errors::ServerError;
use crate::responses::{xlsx_response, ResultResp};

fn write_text(ws: &mut Worksheet, row: u32, col: u16, value: &str) -> Result<(), ServerError> {
    ws.write_string(row, col, value)
        .map_err(|e| ServerError::XlsxError(format!("Failed to write cell ({row},{col}): {e}")))?;
    Ok(())
}

fn write_num(ws: &mut Worksheet, row: u32, col: u16, value: f64) -> Result<(), ServerError> {
    ws.write_number(row, col, value)
        .map_err(|e| ServerError::XlsxError(format!("Failed to write cell ({row},{col}): {e}")))?;
    Ok(())
}

pub fn export_listings_xlsx(listings: &[ListingRow], label: &str) -> ResultResp {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let headers = [
        "Title",
        "City",
        "Postal",
        "Dept",
        "Price (EUR)",
        "Surface (m2)",
        "Rooms",
        "EUR/m2",
        "Seller",
        "Seller Name",
        "Source",
        "URL",
        "First Seen",
    ];

    for (col, header) in headers.iter().enumerate() {
        write_text(worksheet, 0, col as u16, header)?;
    }

    for (i, listing) in listings.iter().enumerate() {
        let r = (i + 1) as u32;

        write_text(worksheet, r, 0, &listing.title)?;
        write_text(worksheet, r, 1, listing.city.as_deref().unwrap_or(""))?;
        write_text(worksheet, r, 2, listing.postal_code.as_deref().unwrap_or(""))?;
        write_text(worksheet, r, 3, listing.department.as_deref().unwrap_or(""))?;
        write_num(worksheet, r, 4, listing.price_eur as f64)?;

        if let Some(surface) = listing.surface_m2 {
            write_num(worksheet, r, 5, surface)?;
        }
        if let Some(rooms) = listing.rooms {
            write_num(worksheet, r, 6, rooms as f64)?;
        }
        if let Some(ppm2) = listing.price_per_m2() {
            write_num(worksheet, r, 7, ppm2 as f64)?;
        }

        write_text(worksheet, r, 8, listing.seller_type.as_str())?;
        write_text(worksheet, r, 9, listing.seller_name.as_deref().unwrap_or(""))?;
        write_text(worksheet, r, 10, &listing.source)?;
        write_text(worksheet, r, 11, &listing.url)?;
        write_text(worksheet, r, 12, &listing.first_seen_at.format("%Y-%m-%d").to_string())?;
    }

    let buffer = workbook
        .save_to_buffer()
        .map_err(|e| ServerError::XlsxError(format!("Failed to save workbook: {e}")))?;

    xlsx_response(buffer, &format!("listings_{label}.xlsx"))
}
