//! Links command handler: affiliate product or search links per region.

use anyhow::{Result, bail};
use bookmeta_core::{ExternalRecord, Region};

use super::{AppContext, print_json};
use crate::cli::LinksArgs;

pub fn run_links_command(context: &AppContext, args: &LinksArgs) -> Result<()> {
    let generator = context.links();
    if !generator.is_enabled() {
        bail!(
            "No affiliate tags configured\n  Suggestion: Set [amazon.affiliate_tags] in the config file or BOOKMETA_AFFILIATE_TAG_<REGION>"
        );
    }

    let regions = if args.regions.is_empty() {
        Region::ALL.to_vec()
    } else {
        args.regions.clone()
    };

    // An unparseable ISBN still works as a plain search term.
    let record = ExternalRecord {
        amazon_asin: args.asin.clone(),
        isbn: args.isbn.clone(),
        title: args
            .title
            .clone()
            .or_else(|| args.isbn.clone())
            .unwrap_or_default(),
        ..ExternalRecord::default()
    };

    print_json(&generator.links_for_record(&record, &regions))
}
