use tracing::debug;

use crate::config::GridBlock;
use crate::error::PlanError;
use crate::source::TableSource;
use crate::types::{monthly_from_slice, Monthly, Origin, OriginTable, MONTHS};

/// Raw price rows plus the exchange-rate rows for foreign origins.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrices {
    pub prices: OriginTable<Monthly>,
    /// Indexed like [`Origin::FOREIGN`].
    pub exchange_rates: [Monthly; 2],
}

impl RawPrices {
    pub fn read(
        source: &dyn TableSource,
        prices: &GridBlock,
        rates: &GridBlock,
    ) -> Result<Self, PlanError> {
        let price_rows = OriginTable::try_from_fn(|origin| {
            let row = source.row(
                &prices.sheet,
                prices.row + origin.index(),
                prices.col..prices.col + MONTHS,
            )?;
            monthly_from_slice(&row, &format!("{origin} prices"))
        })?;

        let mut exchange_rates = [[0.0; MONTHS]; 2];
        for (i, origin) in Origin::FOREIGN.into_iter().enumerate() {
            let row = source.row(&rates.sheet, rates.row + i, rates.col..rates.col + MONTHS)?;
            exchange_rates[i] = monthly_from_slice(&row, &format!("{origin} exchange rates"))?;
        }

        Ok(Self {
            prices: price_rows,
            exchange_rates,
        })
    }

    fn rates_for(&self, origin: Origin) -> Option<&Monthly> {
        Origin::FOREIGN
            .iter()
            .position(|o| *o == origin)
            .map(|i| &self.exchange_rates[i])
    }
}

/// Element-wise product of a price row and an exchange-rate row.
pub fn convert_rates(prices: &[f64], rates: &[f64]) -> Result<Vec<f64>, PlanError> {
    if prices.len() != rates.len() {
        return Err(PlanError::malformed(format!(
            "price row has {} entries but exchange-rate row has {}",
            prices.len(),
            rates.len()
        )));
    }
    Ok(prices.iter().zip(rates).map(|(p, r)| p * r).collect())
}

/// Monthly unit price per origin, converted to the home currency where needed.
///
/// Every derived price must be finite and non-negative.
pub fn derive_prices(raw: &RawPrices) -> Result<OriginTable<Monthly>, PlanError> {
    OriginTable::try_from_fn(|origin| {
        let prices = &raw.prices[origin];
        let derived = match raw.rates_for(origin) {
            Some(rates) => {
                let converted = convert_rates(prices, rates)?;
                debug!(%origin, "converted foreign prices");
                monthly_from_slice(&converted, &format!("{origin} converted prices"))?
            }
            None => *prices,
        };
        if let Some((month, price)) = derived
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(PlanError::malformed(format!(
                "{origin} month {}: derived price {price} is not a non-negative number",
                month + 1
            )));
        }
        Ok(derived)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawPrices {
        RawPrices {
            prices: OriginTable::from_fn(|o| [1.0 + o.index() as f64; MONTHS]),
            exchange_rates: [[2.0; MONTHS], [0.5; MONTHS]],
        }
    }

    #[test]
    fn converts_element_wise() {
        assert_eq!(
            convert_rates(&[1.0, 2.0, 3.0], &[2.0, 0.5, 1.0]).unwrap(),
            vec![2.0, 1.0, 3.0]
        );
    }

    #[test]
    fn length_mismatch_is_malformed() {
        assert!(matches!(
            convert_rates(&[1.0, 2.0], &[1.0]),
            Err(PlanError::MalformedInput(_))
        ));
    }

    #[test]
    fn only_foreign_origins_are_converted() {
        let prices = derive_prices(&raw()).unwrap();
        assert_eq!(prices[Origin::Florida], [1.0; MONTHS]);
        assert_eq!(prices[Origin::Arizona], [4.0; MONTHS]);
        assert_eq!(prices[Origin::Brazil], [10.0; MONTHS]);
        assert_eq!(prices[Origin::Spain], [3.0; MONTHS]);
    }

    #[test]
    fn negative_domestic_price_is_malformed() {
        let mut raw = raw();
        raw.prices = OriginTable::from_fn(|_| [-1.0; MONTHS]);
        assert!(matches!(derive_prices(&raw), Err(PlanError::MalformedInput(_))));
    }

    #[test]
    fn negative_exchange_rate_is_malformed() {
        let mut raw = raw();
        raw.exchange_rates[1][6] = -0.5;
        let err = derive_prices(&raw).unwrap_err();
        assert!(matches!(err, PlanError::MalformedInput(ref msg) if msg.contains("SPA month 7")));
    }

    #[test]
    fn zero_price_is_allowed() {
        let mut raw = raw();
        raw.prices[Origin::Texas] = [0.0; MONTHS];
        assert_eq!(derive_prices(&raw).unwrap()[Origin::Texas], [0.0; MONTHS]);
    }
}
