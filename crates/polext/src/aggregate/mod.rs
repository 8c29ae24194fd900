//! Merging of per-document extracts into one policy record.
//!
//! Client data, risks and notes come from the first analyzed document.
//! Offers from all documents are concatenated, deduplicated by company and
//! their monetary fields normalized.

pub mod dedup;
pub mod number;

use crate::model::{DocumentExtract, DocumentState, Offer, PolicyExtract, RawOffer};

pub use dedup::{company_key, dedup_by_company};
pub use number::{derive_rate4, digits_only, format_amount, group_thousands, parse_amount};

/// Normalizes one raw offer.
pub fn normalize_offer(raw: &RawOffer) -> Offer {
    let rate1 = format_amount(&raw.rate1);
    let rate4 = derive_rate4(&rate1);
    Offer {
        company: raw.company_name().to_string(),
        rate1,
        rate4,
        franchise_partial: format_amount(&raw.franchise_partial),
        franchise_total: digits_only(&raw.franchise_total),
        sum: format_amount(&raw.sum),
    }
}

fn merge_offers<'a>(offers: impl Iterator<Item = &'a RawOffer>) -> Vec<Offer> {
    dedup_by_company(offers, |offer| offer.company_name())
        .into_iter()
        .map(normalize_offer)
        .collect()
}

/// Aggregates extracts in the given order.
///
/// Returns `None` when there is nothing to aggregate.
pub fn aggregate(extracts: &[&DocumentExtract]) -> Option<PolicyExtract> {
    let first = extracts.first()?;

    let offers_without_franchise = merge_offers(
        extracts
            .iter()
            .flat_map(|e| e.offers_without_franchise.iter()),
    );
    let offers_with_franchise =
        merge_offers(extracts.iter().flat_map(|e| e.offers_with_franchise.iter()));

    Some(PolicyExtract {
        client_data: first.client_data.clone(),
        offers_without_franchise,
        offers_with_franchise,
        risks: first.risks.clone(),
        notes: first.notes.clone(),
    })
}

/// Aggregates the analyzed documents of a job, skipping failed ones.
pub fn aggregate_documents(documents: &[DocumentState]) -> Option<PolicyExtract> {
    let extracts: Vec<&DocumentExtract> =
        documents.iter().filter_map(DocumentState::analyzed_data).collect();
    aggregate(&extracts)
}
