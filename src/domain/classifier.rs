// src/domain/classifier.rs

use crate::domain::listing::SellerType;

/// Phrases that mark a private sale outright. Checked before the score:
/// "agences s'abstenir" contains "agence" and would otherwise vote
/// professional.
const PRIVATE_OVERRIDES: &[&str] = &[
    "vente entre particuliers",
    "de particulier à particulier",
    "agences s'abstenir",
    "agence s'abstenir",
    "pas d'agence",
    "pas serieux s'abstenir",
];

/// Vocabulary only professionals use in ad copy. One point each.
const PRO_TEXT_SIGNALS: &[&str] = &[
    "agence",
    "immobilier",
    "immobilière",
    "honoraires",
    "frais d'agence",
    "exclusivité",
    "mandat",
    "gestion locative",
    "barème",
    "dpe",
    "carte professionnelle",
];

/// Legal forms and trade words in the seller name. Two points each:
/// a name signal is stronger than ad copy.
const PRO_NAME_SIGNALS: &[&str] = &[
    "agence", "immo", "sarl", "sas", "sci", "eurl", "cabinet", "gestion", "orpi", "century",
    "laforêt", "guy hoquet", "safti", "iad",
];

/// Heuristically labels a listing's seller from text signals.
///
/// Precedence:
/// 1. An explicit private-sale phrase wins immediately.
/// 2. Otherwise keyword votes accumulate (seller name counts double,
///    a SIRET number counts double) and two points mean professional.
///
/// Ties stay `Private`: a wrong "professional" label hides the listing
/// from the private-seller filter, so the classifier demands evidence.
pub fn classify_seller(
    title: &str,
    description: Option<&str>,
    seller_name: Option<&str>,
) -> SellerType {
    let mut text = title.to_lowercase();
    if let Some(d) = description {
        text.push(' ');
        text.push_str(&d.to_lowercase());
    }

    for phrase in PRIVATE_OVERRIDES {
        if text.contains(phrase) {
            return SellerType::Private;
        }
    }

    let mut score = 0u32;

    if let Some(name) = seller_name {
        let name = name.to_lowercase();
        if PRO_NAME_SIGNALS.iter().any(|kw| name.contains(kw)) {
            score += 2;
        }
    }

    for kw in PRO_TEXT_SIGNALS {
        if text.contains(kw) {
            score += 1;
        }
    }

    if contains_siret(&text) {
        score += 2;
    }

    if score >= 2 {
        SellerType::Professional
    } else {
        SellerType::Private
    }
}

/// A SIRET is 14 consecutive digits (spaces allowed in print form).
/// We only look for the compact form plus the "siret"/"siren" label.
fn contains_siret(text: &str) -> bool {
    if text.contains("siret") || text.contains("siren") {
        return true;
    }
    let mut run = 0;
    for c in text.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= 14 {
                return true;
            }
        } else if c != ' ' {
            run = 0;
        }
    }
    false
}
