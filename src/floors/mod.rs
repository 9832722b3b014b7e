//! Floor resolution (spec.md §4.6), generalized from the teacher's
//! `app/pipeline/ortb/tasks/floors_markup.rs` (`MIN_FLOOR`, per-deal
//! floor bump-up) into the spec's `effective_floor` computation with
//! currency conversion to the auction currency.

use crate::currency::{ConversionError, CurrencyConverter};
use crate::rtb::Imp;

#[derive(Debug, Clone, Copy, Default)]
pub struct FloorOverrides {
    pub publisher_floor_override: Option<f64>,
    pub deal_floor: Option<f64>,
}

/// `effective_floor(imp) = max(request_floor, publisher_floor_override,
/// deal_floor)`, converted into the auction currency.
pub fn effective_floor_usd(
    imp: &Imp,
    overrides: FloorOverrides,
    auction_currency: &str,
    converter: &CurrencyConverter,
) -> Result<f64, ConversionError> {
    let raw_floor = [
        Some(imp.bidfloor),
        overrides.publisher_floor_override,
        overrides.deal_floor,
    ]
    .into_iter()
    .flatten()
    .fold(0.0_f64, f64::max);

    converter.convert(raw_floor, &imp.bidfloorcur, auction_currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyTable;
    use crate::rtb::ImpBuilder;

    #[test]
    fn takes_max_of_all_floor_sources() {
        let imp = ImpBuilder::default()
            .id("i1".to_string())
            .bidfloor(0.5)
            .bidfloorcur("USD".to_string())
            .build()
            .unwrap();

        let converter = CurrencyConverter::new(CurrencyTable::new());
        let floor = effective_floor_usd(
            &imp,
            FloorOverrides { publisher_floor_override: Some(0.75), deal_floor: Some(0.6) },
            "USD",
            &converter,
        )
        .unwrap();

        assert_eq!(floor, 0.75);
    }

    #[test]
    fn converts_to_auction_currency() {
        let imp = ImpBuilder::default()
            .id("i1".to_string())
            .bidfloor(1.0)
            .bidfloorcur("EUR".to_string())
            .build()
            .unwrap();

        let converter = CurrencyConverter::new(CurrencyTable::new().with_rate("EUR", "USD", 1.1));
        let floor = effective_floor_usd(&imp, FloorOverrides::default(), "USD", &converter).unwrap();

        assert!((floor - 1.1).abs() < 1e-9);
    }
}
