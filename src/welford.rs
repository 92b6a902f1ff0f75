use rust_decimal::{Decimal, MathematicalOps};

/// Online per-group statistics in one pass: running total, mean and M2
/// (Welford's algorithm), so no per-group value list is ever buffered.
/// All arithmetic stays in `Decimal`; no binary floating point.
#[derive(Debug, Clone, Default)]
pub struct WelfordAccumulator {
    pub count: u64,
    pub mean: Decimal,
    pub m2: Decimal,
    pub total: Decimal,
}

impl WelfordAccumulator {
    pub fn add(&mut self, value: Decimal) {
        self.total += value;
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / Decimal::from(self.count);
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Population variance, M2/n.
    pub fn population_variance(&self) -> Decimal {
        if self.count == 0 {
            return Decimal::ZERO;
        }
        self.m2 / Decimal::from(self.count)
    }

    /// Population standard deviation; 0 when the variance is not positive.
    pub fn population_std_dev(&self) -> Decimal {
        let variance = self.population_variance();
        if variance > Decimal::ZERO {
            variance.sqrt().unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn known_sequence() {
        let mut acc = WelfordAccumulator::default();
        for v in ["10", "20", "30"] {
            acc.add(dec(v));
        }
        assert_eq!(acc.count, 3);
        assert_eq!(acc.total, dec("60"));
        assert_eq!(acc.mean.round_dp(2), dec("20.00"));
        assert_eq!(acc.population_std_dev().round_dp(2), dec("8.16"));
    }

    #[test]
    fn matches_two_pass_formula() {
        let values = ["1250.75", "980.10", "1423.33", "1250.75", "2.00", "870.42"];

        let mut acc = WelfordAccumulator::default();
        for v in &values {
            acc.add(dec(v));
        }

        let n = Decimal::from(values.len() as u64);
        let sum: Decimal = values.iter().map(|v| dec(v)).sum();
        let mean = sum / n;
        let ssd: Decimal = values.iter().map(|v| (dec(v) - mean) * (dec(v) - mean)).sum();
        let std_dev = (ssd / n).sqrt().unwrap();

        assert_eq!(acc.total, sum);
        assert_eq!(acc.mean.round_dp(2), mean.round_dp(2));
        assert_eq!(acc.population_std_dev().round_dp(2), std_dev.round_dp(2));
    }

    #[test]
    fn single_value_has_zero_deviation() {
        let mut acc = WelfordAccumulator::default();
        acc.add(dec("42.42"));
        assert_eq!(acc.mean, dec("42.42"));
        assert_eq!(acc.population_std_dev(), Decimal::ZERO);
    }

    #[test]
    fn empty_accumulator_is_all_zero() {
        let acc = WelfordAccumulator::default();
        assert_eq!(acc.population_variance(), Decimal::ZERO);
        assert_eq!(acc.population_std_dev(), Decimal::ZERO);
    }
}
