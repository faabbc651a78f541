//! Game configuration
//!
//! Everything that varies between scenarios is data: the valuation grid,
//! the phase ladder, the equipment catalogue, the enterprise roster with
//! certificate schemes, and the consolidation plan. A `GameConfig` is
//! validated up front; the engine assumes a validated config afterwards
//! and treats dangling references at runtime as invariant violations.
//!
//! `GameConfig::standard` builds the scenario the engine ships with: six
//! provincial minors that consolidate into a national railway, seven
//! majors, and a ten-phase equipment ladder.

use serde::{Deserialize, Serialize};

use crate::market::{CellTag, SellMovement, ValuationGrid};
use crate::models::enterprise::EnterpriseClass;

/// Tile colour tiers unlocked by phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileTier {
    Yellow,
    Green,
    Brown,
}

/// Named occurrences a phase can fire when entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseEvent {
    /// The consolidation may now be triggered.
    ConsolidationReady,
}

/// Currency rendering: a template with `%s` standing for the amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    template: String,
}

impl CurrencyFormat {
    /// # Example
    /// ```
    /// use magnate_core::config::CurrencyFormat;
    ///
    /// let currency = CurrencyFormat::new("%sM");
    /// assert_eq!(currency.render(400), "400M");
    /// assert_eq!(currency.render(-15), "-15M");
    /// ```
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn render(&self, amount: i64) -> String {
        self.template.replace("%s", &amount.to_string())
    }
}

/// One participant seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyConfig {
    pub id: String,
    pub name: String,
}

/// One entry of a certificate scheme: `count` certificates of `percent`
/// each. A scheme has exactly one controlling entry with a count of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub percent: u8,
    pub count: usize,
    pub controlling: bool,
    /// Counts as one slot against holding limits despite doubled size.
    pub double: bool,
}

impl CertificateSpec {
    pub fn ordinary(percent: u8, count: usize) -> Self {
        Self {
            percent,
            count,
            controlling: false,
            double: false,
        }
    }

    pub fn controlling(percent: u8) -> Self {
        Self {
            percent,
            count: 1,
            controlling: true,
            double: false,
        }
    }

    pub fn double(percent: u8, count: usize) -> Self {
        Self {
            percent,
            count,
            controlling: false,
            double: true,
        }
    }
}

/// An enterprise available from setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterpriseConfig {
    pub id: String,
    pub name: String,
    pub class: EnterpriseClass,
    pub scheme: Vec<CertificateSpec>,
    /// Par valuation placed at setup; `None` for enterprises whose value
    /// never sits on the grid.
    pub par_price: Option<i64>,
}

/// One rung of the phase ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    /// Equipment tier whose first purchase brings the phase in.
    pub on_equipment: String,
    /// Per-class certificate holding limits; classes without an entry are
    /// unlimited in this phase.
    pub holding_limits: Vec<(EnterpriseClass, usize)>,
    pub tile_tiers: Vec<TileTier>,
    /// Operating rounds per full cycle while this phase is current.
    pub operating_rounds: usize,
    pub event: Option<PhaseEvent>,
}

/// One equipment tier in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpec {
    pub tier: String,
    pub range: u32,
    pub price: i64,
    pub count: usize,
    /// Tier whose first purchase removes this one from play.
    pub rusts_on: Option<String>,
}

/// The enterprise the consolidation creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessorConfig {
    pub id: String,
    pub name: String,
    pub class: EnterpriseClass,
    pub scheme: Vec<CertificateSpec>,
    /// Seed capital paid by the bank when the successor forms.
    pub starting_cash: i64,
    /// Equipment tier granted to the successor when it forms.
    pub starting_equipment: String,
}

/// The consolidation plan: which enterprises fold, in which order, into
/// what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Predecessors in priority order, highest first. The same order
    /// breaks controlling-owner ties.
    pub predecessors: Vec<String>,
    pub successor: SuccessorConfig,
    /// Price of each replacement token minted for the successor.
    pub token_price: i64,
}

/// Full scenario description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub parties: Vec<PartyConfig>,
    pub enterprises: Vec<EnterpriseConfig>,
    pub grid_rows: Vec<Vec<String>>,
    pub sell_movement: SellMovement,
    pub phases: Vec<Phase>,
    pub equipment: Vec<EquipmentSpec>,
    pub consolidation: ConsolidationConfig,
    /// Certificate limit per participant count.
    pub certificate_limits: Vec<(usize, usize)>,
    /// Starting capital per participant count.
    pub starting_capital: Vec<(usize, i64)>,
    pub bank_cash: i64,
    pub currency: CurrencyFormat,
}

impl GameConfig {
    /// The standard scenario, seated for the given `(id, name)` parties.
    pub fn standard(parties: &[(&str, &str)]) -> Self {
        let minors: Vec<EnterpriseConfig> = (1..=6)
            .map(|n| EnterpriseConfig {
                id: format!("P{}", n),
                name: format!("Provincial Railway {}", n),
                class: EnterpriseClass::Minor,
                scheme: vec![CertificateSpec::controlling(100)],
                par_price: None,
            })
            .collect();

        let majors = [
            ("NR", "Northern Railway", 92),
            ("SR", "Southern Railway", 88),
            ("ER", "Eastern Railway", 84),
            ("WR", "Western Railway", 84),
            ("HR", "Highland Railway", 84),
            ("MR", "Midland Railway", 80),
            ("CR", "Coastal Railway", 80),
        ]
        .iter()
        .map(|(id, name, par)| EnterpriseConfig {
            id: id.to_string(),
            name: name.to_string(),
            class: EnterpriseClass::Major,
            scheme: vec![
                CertificateSpec::controlling(20),
                CertificateSpec::ordinary(10, 8),
            ],
            par_price: Some(*par),
        });

        let mut enterprises = minors;
        enterprises.extend(majors);

        Self {
            parties: parties
                .iter()
                .map(|(id, name)| PartyConfig {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            enterprises,
            grid_rows: standard_grid_rows(),
            sell_movement: SellMovement::DownBlock,
            phases: standard_phases(),
            equipment: standard_equipment(),
            consolidation: ConsolidationConfig {
                predecessors: (1..=6).map(|n| format!("P{}", n)).collect(),
                successor: SuccessorConfig {
                    id: "UCR".to_string(),
                    name: "Union Consolidated Railway".to_string(),
                    class: EnterpriseClass::National,
                    scheme: vec![
                        CertificateSpec::controlling(10),
                        CertificateSpec::double(10, 5),
                        CertificateSpec::ordinary(5, 8),
                    ],
                    starting_cash: 400,
                    starting_equipment: "4".to_string(),
                },
                token_price: 100,
            },
            certificate_limits: vec![(3, 19), (4, 15), (5, 12), (6, 11), (7, 9)],
            starting_capital: vec![(3, 600), (4, 475), (5, 390), (6, 340), (7, 310)],
            bank_cash: 12_000,
            currency: CurrencyFormat::new("%sM"),
        }
    }

    /// Starting capital for a table of `num_parties`.
    pub fn starting_cash_for(&self, num_parties: usize) -> Option<i64> {
        self.starting_capital
            .iter()
            .find(|(n, _)| *n == num_parties)
            .map(|(_, cash)| *cash)
    }

    /// Certificate holding limit for a table of `num_parties`.
    pub fn certificate_limit_for(&self, num_parties: usize) -> Option<usize> {
        self.certificate_limits
            .iter()
            .find(|(n, _)| *n == num_parties)
            .map(|(_, limit)| *limit)
    }

    /// Index of the phase called `name`.
    pub fn find_phase(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    /// Validate the whole configuration. Returns a description of the
    /// first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.parties.is_empty() {
            return Err("no parties configured".to_string());
        }
        let mut party_ids: Vec<&str> = Vec::new();
        for party in &self.parties {
            if party.id.is_empty() {
                return Err("party with empty id".to_string());
            }
            if party_ids.contains(&party.id.as_str()) {
                return Err(format!("duplicate party id: {}", party.id));
            }
            party_ids.push(&party.id);
        }
        if self.starting_cash_for(self.parties.len()).is_none() {
            return Err(format!(
                "no starting capital defined for {} parties",
                self.parties.len()
            ));
        }
        if self.certificate_limit_for(self.parties.len()).is_none() {
            return Err(format!(
                "no certificate limit defined for {} parties",
                self.parties.len()
            ));
        }

        let grid = ValuationGrid::from_spec(&self.grid_rows, self.sell_movement.clone())?;
        if grid.cells_of_type(CellTag::MergerPar).is_empty() {
            return Err("grid has no reserved consolidation cell".to_string());
        }

        let successor_id = &self.consolidation.successor.id;
        let mut enterprise_ids: Vec<&str> = Vec::new();
        for enterprise in &self.enterprises {
            if enterprise.id.is_empty() {
                return Err("enterprise with empty id".to_string());
            }
            if enterprise_ids.contains(&enterprise.id.as_str()) {
                return Err(format!("duplicate enterprise id: {}", enterprise.id));
            }
            if &enterprise.id == successor_id {
                return Err(format!(
                    "enterprise id {} collides with the consolidation successor",
                    enterprise.id
                ));
            }
            enterprise_ids.push(&enterprise.id);
            validate_scheme(&enterprise.id, &enterprise.scheme)?;
            if let Some(par) = enterprise.par_price {
                if grid.par_cell_for(par).is_none() {
                    return Err(format!(
                        "par price {} of {} is not a par cell in the grid",
                        par, enterprise.id
                    ));
                }
            }
        }

        if self.equipment.is_empty() {
            return Err("no equipment configured".to_string());
        }
        let mut tiers: Vec<&str> = Vec::new();
        for spec in &self.equipment {
            if tiers.contains(&spec.tier.as_str()) {
                return Err(format!("duplicate equipment tier: {}", spec.tier));
            }
            if spec.count == 0 {
                return Err(format!("equipment tier {} has a count of zero", spec.tier));
            }
            tiers.push(&spec.tier);
        }
        for spec in &self.equipment {
            if let Some(rusts) = &spec.rusts_on {
                if !tiers.contains(&rusts.as_str()) {
                    return Err(format!(
                        "equipment tier {} rusts on unknown tier {}",
                        spec.tier, rusts
                    ));
                }
            }
        }

        if self.phases.is_empty() {
            return Err("no phases configured".to_string());
        }
        let mut phase_names: Vec<&str> = Vec::new();
        for phase in &self.phases {
            if phase_names.contains(&phase.name.as_str()) {
                return Err(format!("duplicate phase name: {}", phase.name));
            }
            phase_names.push(&phase.name);
            if phase.operating_rounds == 0 {
                return Err(format!("phase {} has zero operating rounds", phase.name));
            }
            if !tiers.contains(&phase.on_equipment.as_str()) {
                return Err(format!(
                    "phase {} keys on unknown equipment tier {}",
                    phase.name, phase.on_equipment
                ));
            }
        }

        let plan = &self.consolidation;
        if plan.predecessors.is_empty() {
            return Err("consolidation has no predecessors".to_string());
        }
        let mut preds: Vec<&str> = Vec::new();
        for pred in &plan.predecessors {
            if !enterprise_ids.contains(&pred.as_str()) {
                return Err(format!("consolidation predecessor {} is not configured", pred));
            }
            if preds.contains(&pred.as_str()) {
                return Err(format!("duplicate consolidation predecessor: {}", pred));
            }
            preds.push(pred);
        }
        validate_scheme(successor_id, &plan.successor.scheme)?;
        if plan.successor.starting_cash < 0 {
            return Err("successor starting cash is negative".to_string());
        }
        if !tiers.contains(&plan.successor.starting_equipment.as_str()) {
            return Err(format!(
                "successor starting equipment {} is not in the catalogue",
                plan.successor.starting_equipment
            ));
        }
        if plan.token_price < 0 {
            return Err("consolidation token price is negative".to_string());
        }

        if self.bank_cash <= 0 {
            return Err("bank cash must be positive".to_string());
        }

        Ok(())
    }
}

fn validate_scheme(owner: &str, scheme: &[CertificateSpec]) -> Result<(), String> {
    if scheme.is_empty() {
        return Err(format!("{} has an empty certificate scheme", owner));
    }
    let mut total: u32 = 0;
    let mut controlling = 0usize;
    for spec in scheme {
        if spec.percent == 0 || spec.percent % 5 != 0 {
            return Err(format!(
                "{} has a certificate of {}%, not a positive multiple of 5",
                owner, spec.percent
            ));
        }
        if spec.count == 0 {
            return Err(format!("{} has a certificate entry with a count of zero", owner));
        }
        if spec.controlling {
            controlling += spec.count;
        }
        total += u32::from(spec.percent) * spec.count as u32;
    }
    if controlling != 1 {
        return Err(format!(
            "{} must have exactly one controlling certificate, found {}",
            owner, controlling
        ));
    }
    if total != 100 {
        return Err(format!(
            "{} certificate scheme sums to {}%, expected 100%",
            owner, total
        ));
    }
    Ok(())
}

fn standard_grid_rows() -> Vec<Vec<String>> {
    let rows: Vec<Vec<&str>> = vec![
        vec![
            "", "", "", "", "132", "148", "166", "186", "208", "232", "258", "286", "316", "348",
            "382", "418",
        ],
        vec![
            "", "", "98", "108", "120", "134", "150", "168", "188", "210", "234", "260", "288",
            "318", "350", "384",
        ],
        vec![
            "82", "86", "92p", "100", "110", "122", "136", "152", "170", "190", "212", "236",
            "262", "290", "320",
        ],
        vec![
            "78", "84p", "88p", "94", "102", "112", "124", "138", "154P", "172", "192", "214",
        ],
        vec!["72", "80p", "86", "90", "96", "104", "114", "126", "140"],
        vec!["64", "74", "82", "88", "92", "98", "106"],
        vec!["54", "66", "76", "84", "90"],
    ];
    rows.into_iter()
        .map(|row| row.into_iter().map(str::to_string).collect())
        .collect()
}

fn standard_phases() -> Vec<Phase> {
    use EnterpriseClass::{Major, Minor, National};
    use TileTier::{Brown, Green, Yellow};

    let phase = |name: &str,
                 on_equipment: &str,
                 holding_limits: Vec<(EnterpriseClass, usize)>,
                 tile_tiers: Vec<TileTier>,
                 operating_rounds: usize,
                 event: Option<PhaseEvent>| Phase {
        name: name.to_string(),
        on_equipment: on_equipment.to_string(),
        holding_limits,
        tile_tiers,
        operating_rounds,
        event,
    };

    vec![
        phase("1.1", "2", vec![(Minor, 2), (Major, 4)], vec![Yellow], 1, None),
        phase("1.2", "2+2", vec![(Minor, 2), (Major, 4)], vec![Yellow], 1, None),
        phase(
            "2.1",
            "3",
            vec![(Minor, 2), (Major, 4)],
            vec![Yellow, Green],
            2,
            None,
        ),
        phase(
            "2.2",
            "3+3",
            vec![(Minor, 2), (Major, 4)],
            vec![Yellow, Green],
            2,
            None,
        ),
        phase(
            "2.3",
            "4",
            vec![(Minor, 1), (Major, 3), (National, 4)],
            vec![Yellow, Green],
            2,
            Some(PhaseEvent::ConsolidationReady),
        ),
        phase(
            "2.4",
            "4+4",
            vec![(Minor, 1), (Major, 3), (National, 4)],
            vec![Yellow, Green],
            2,
            None,
        ),
        phase(
            "3.1",
            "5",
            vec![(Minor, 1), (Major, 2), (National, 3)],
            vec![Yellow, Green, Brown],
            3,
            None,
        ),
        phase(
            "3.2",
            "5+5",
            vec![(Minor, 1), (Major, 2), (National, 3)],
            vec![Yellow, Green, Brown],
            3,
            None,
        ),
        phase(
            "3.3",
            "6",
            vec![(Minor, 1), (Major, 2), (National, 3)],
            vec![Yellow, Green, Brown],
            3,
            None,
        ),
        phase(
            "3.4",
            "6+6",
            vec![(Minor, 1), (Major, 2), (National, 3)],
            vec![Yellow, Green, Brown],
            3,
            None,
        ),
    ]
}

fn standard_equipment() -> Vec<EquipmentSpec> {
    let spec = |tier: &str, range: u32, price: i64, count: usize, rusts_on: Option<&str>| {
        EquipmentSpec {
            tier: tier.to_string(),
            range,
            price,
            count,
            rusts_on: rusts_on.map(str::to_string),
        }
    };

    vec![
        spec("2", 2, 80, 9, Some("4")),
        spec("2+2", 2, 120, 4, Some("4+4")),
        spec("3", 3, 180, 4, Some("6")),
        spec("3+3", 3, 270, 3, Some("6+6")),
        spec("4", 4, 360, 3, None),
        spec("4+4", 4, 440, 1, None),
        spec("5", 5, 500, 2, None),
        spec("5+5", 5, 600, 1, None),
        spec("6", 6, 600, 2, None),
        spec("6+6", 6, 720, 4, None),
    ]
}
