//! Strategy definition.
//!
//! A [`Strategy`] bundles the four pipeline stages and the ordered
//! constraint list. It is immutable once built and shared read-only with
//! every backtest worker.

use std::fmt;
use std::sync::Arc;
use tavira_optimize::{Constraint, PortfolioConstructor};
use tavira_traits::{AlphaConstructor, Result, ScoreConstructor, SignalConstructor, TaviraError};

/// Signal, score, alpha and portfolio construction plus constraints.
#[derive(Clone)]
pub struct Strategy {
    name: String,
    signal: Arc<dyn SignalConstructor>,
    score: Arc<dyn ScoreConstructor>,
    alpha: Arc<dyn AlphaConstructor>,
    portfolio: Arc<dyn PortfolioConstructor>,
    constraints: Vec<Constraint>,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("signal", &self.signal.name())
            .field("score", &self.score.name())
            .field("alpha", &self.alpha.name())
            .field("portfolio", &self.portfolio.name())
            .field("constraints", &self.constraints)
            .finish()
    }
}

impl Strategy {
    /// Starts a builder.
    pub fn builder() -> StrategyBuilder {
        StrategyBuilder::default()
    }

    /// Strategy name; defaults to the signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal stage.
    pub fn signal(&self) -> &dyn SignalConstructor {
        self.signal.as_ref()
    }

    /// Score stage.
    pub fn score(&self) -> &dyn ScoreConstructor {
        self.score.as_ref()
    }

    /// Alpha stage.
    pub fn alpha(&self) -> &dyn AlphaConstructor {
        self.alpha.as_ref()
    }

    /// Portfolio construction stage.
    pub fn portfolio(&self) -> &dyn PortfolioConstructor {
        self.portfolio.as_ref()
    }

    /// Constraints in application order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Whether any constraint needs predicted betas.
    pub fn requires_betas(&self) -> bool {
        self.constraints.iter().any(Constraint::requires_betas)
    }

    /// Checks the constraint list for problems that would fail every period.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::InvalidData`] for a non-positive or non-finite
    /// position cap, a non-finite beta target, or full and zero investment
    /// requested together.
    pub fn validate(&self) -> Result<()> {
        for constraint in &self.constraints {
            match constraint {
                Constraint::MaxWeight { limit } if !limit.is_finite() || *limit <= 0.0 => {
                    return Err(TaviraError::InvalidData(format!(
                        "{constraint}: position cap must be positive"
                    )));
                }
                Constraint::BetaTarget { target } if !target.is_finite() => {
                    return Err(TaviraError::InvalidData(format!(
                        "{constraint}: beta target must be finite"
                    )));
                }
                _ => {}
            }
        }
        let has = |c: &Constraint| self.constraints.contains(c);
        if has(&Constraint::FullInvestment) && has(&Constraint::ZeroInvestment) {
            return Err(TaviraError::InvalidData(
                "full investment and zero investment are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Strategy`].
#[derive(Default)]
pub struct StrategyBuilder {
    name: Option<String>,
    signal: Option<Arc<dyn SignalConstructor>>,
    score: Option<Arc<dyn ScoreConstructor>>,
    alpha: Option<Arc<dyn AlphaConstructor>>,
    portfolio: Option<Arc<dyn PortfolioConstructor>>,
    constraints: Vec<Constraint>,
}

impl fmt::Debug for StrategyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyBuilder")
            .field("name", &self.name)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

impl StrategyBuilder {
    /// Sets the strategy name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the signal stage.
    pub fn signal(mut self, signal: impl SignalConstructor + 'static) -> Self {
        self.signal = Some(Arc::new(signal));
        self
    }

    /// Sets a boxed signal stage, e.g. one from the signal registry.
    pub fn boxed_signal(mut self, signal: Box<dyn SignalConstructor>) -> Self {
        self.signal = Some(Arc::from(signal));
        self
    }

    /// Sets the score stage.
    pub fn score(mut self, score: impl ScoreConstructor + 'static) -> Self {
        self.score = Some(Arc::new(score));
        self
    }

    /// Sets the alpha stage.
    pub fn alpha(mut self, alpha: impl AlphaConstructor + 'static) -> Self {
        self.alpha = Some(Arc::new(alpha));
        self
    }

    /// Sets the portfolio construction stage.
    pub fn portfolio(mut self, portfolio: impl PortfolioConstructor + 'static) -> Self {
        self.portfolio = Some(Arc::new(portfolio));
        self
    }

    /// Appends a constraint.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Appends several constraints.
    pub fn constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Builds and validates the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`TaviraError::InvalidData`] if a stage is missing or
    /// [`Strategy::validate`] fails.
    pub fn build(self) -> Result<Strategy> {
        let missing = |stage: &str| TaviraError::InvalidData(format!("strategy is missing its {stage} stage"));
        let signal = self.signal.ok_or_else(|| missing("signal"))?;
        let strategy = Strategy {
            name: self.name.unwrap_or_else(|| signal.name().to_string()),
            score: self.score.ok_or_else(|| missing("score"))?,
            alpha: self.alpha.ok_or_else(|| missing("alpha"))?,
            portfolio: self.portfolio.ok_or_else(|| missing("portfolio"))?,
            signal,
            constraints: self.constraints,
        };
        strategy.validate()?;
        Ok(strategy)
    }
}
