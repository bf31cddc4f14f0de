//! Outbound message handoff
//!
//! Builds the plain-text message for a matched record and the WhatsApp deep
//! link that carries it. Nothing is sent from here.

use url::Url;

use crate::domain::{Requirement, VehicleListing};

const WHATSAPP_BASE: &str = "https://wa.me/";

/// Seller to buyer, about the buyer's requirement
pub fn requirement_match_message(requirement: &Requirement) -> String {
    let wanted = describe(
        requirement.make.as_deref(),
        requirement.model.as_deref(),
        requirement.vehicle_type.as_str(),
    );

    let mut message = format!("Hi! I saw your requirement for a {} on CarMatch", wanted);
    match (requirement.year_range_min, requirement.year_range_max) {
        (Some(min), Some(max)) => message.push_str(&format!(" ({}-{})", min, max)),
        (Some(min), None) => message.push_str(&format!(" ({} or newer)", min)),
        (None, Some(max)) => message.push_str(&format!(" (up to {})", max)),
        (None, None) => {}
    }
    message.push_str(". I have a matching vehicle available. Are you still looking?");
    message
}

/// Buyer to seller, about the seller's listing
pub fn listing_match_message(listing: &VehicleListing) -> String {
    let mut message = format!(
        "Hi! I'm interested in your {} {} {} listed for Rs. {} on CarMatch",
        listing.year,
        listing.make,
        listing.model,
        format_price(listing.price)
    );
    if let Some(location) = listing.location.as_deref().filter(|l| !l.trim().is_empty()) {
        message.push_str(&format!(" in {}", location));
    }
    message.push_str(". Is it still available?");
    message
}

/// `https://wa.me/<digits>?text=<message>`; non-digits in `phone` are dropped
pub fn whatsapp_link(phone: &str, message: &str) -> Result<Url, url::ParseError> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    Url::parse_with_params(&format!("{}{}", WHATSAPP_BASE, digits), &[("text", message)])
}

fn describe(make: Option<&str>, model: Option<&str>, vehicle_type: &str) -> String {
    let parts: Vec<&str> = [make, model]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        vehicle_type.to_string()
    } else {
        parts.join(" ")
    }
}

/// Indian digit grouping: 1500000 -> 15,00,000
fn format_price(price: i64) -> String {
    let digits = price.unsigned_abs().to_string();
    let sign = if price < 0 { "-" } else { "" };
    if digits.len() <= 3 {
        return format!("{}{}", sign, digits);
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("{}{},{}", sign, groups.join(","), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleType;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(999), "999");
        assert_eq!(format_price(85_000), "85,000");
        assert_eq!(format_price(1_500_000), "15,00,000");
        assert_eq!(format_price(12_345_678), "1,23,45,678");
    }

    #[test]
    fn test_requirement_message() {
        let req = Requirement::new(VehicleType::Car, "b")
            .with_make("Toyota")
            .with_model("Innova")
            .with_year_range(Some(2018), None);
        assert_eq!(
            requirement_match_message(&req),
            "Hi! I saw your requirement for a Toyota Innova on CarMatch (2018 or newer). \
             I have a matching vehicle available. Are you still looking?"
        );

        let any_bike = Requirement::new(VehicleType::Bike, "b");
        assert!(requirement_match_message(&any_bike).contains("requirement for a bike on"));
    }

    #[test]
    fn test_listing_message() {
        let listing = VehicleListing::new(VehicleType::Car, "Honda", "City", 2019, 850_000, "s")
            .with_location("Pune");
        assert_eq!(
            listing_match_message(&listing),
            "Hi! I'm interested in your 2019 Honda City listed for Rs. 8,50,000 on CarMatch in Pune. \
             Is it still available?"
        );
    }

    #[test]
    fn test_whatsapp_link_encodes_text() {
        let link = whatsapp_link("+91 98765-43210", "Hi! 50% off & more").unwrap();
        assert_eq!(link.host_str(), Some("wa.me"));
        assert_eq!(link.path(), "/919876543210");
        let text: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(text, vec![("text".to_string(), "Hi! 50% off & more".to_string())]);
    }
}
