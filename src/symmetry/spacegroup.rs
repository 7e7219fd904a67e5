//! Space groups as sets of symmetry operations.

use std::fmt;

use super::op::{SymOp, DEN};
use super::SymmetryError;

/// A space group: primitive operations plus lattice centring vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGroup {
    number: u16,
    hm: String,
    sym_ops: Vec<SymOp>,
    cen_ops: Vec<[i32; 3]>,
}

#[derive(Clone, Copy)]
enum Centering {
    P,
    C,
    I,
    F,
    R,
}

impl Centering {
    fn vectors(self) -> Vec<[i32; 3]> {
        let h = DEN / 2;
        let (t1, t2) = (DEN / 3, 2 * DEN / 3);
        match self {
            Centering::P => vec![[0, 0, 0]],
            Centering::C => vec![[0, 0, 0], [h, h, 0]],
            Centering::I => vec![[0, 0, 0], [h, h, h]],
            Centering::F => vec![[0, 0, 0], [0, h, h], [h, 0, h], [h, h, 0]],
            Centering::R => vec![[0, 0, 0], [t2, t1, t1], [t1, t2, t2]],
        }
    }
}

struct Entry {
    number: u16,
    hm: &'static str,
    aliases: &'static [&'static str],
    centering: Centering,
    ops: &'static [&'static str],
}

const P3_OPS: &[&str] = &["x,y,z", "-y,x-y,z", "-x+y,-x,z"];
const P4_OPS: &[&str] = &["x,y,z", "-x,-y,z", "-y,x,z", "y,-x,z"];
const P222_OPS: &[&str] = &["x,y,z", "-x,-y,z", "-x,y,-z", "x,-y,-z"];
const P23_OPS: &[&str] = &[
    "x,y,z", "-x,-y,z", "-x,y,-z", "x,-y,-z", "z,x,y", "z,-x,-y", "-z,-x,y", "-z,x,-y",
    "y,z,x", "-y,z,-x", "y,-z,-x", "-y,-z,x",
];

const TABLE: &[Entry] = &[
    Entry { number: 1, hm: "P 1", aliases: &[], centering: Centering::P, ops: &["x,y,z"] },
    Entry { number: 2, hm: "P -1", aliases: &[], centering: Centering::P, ops: &["x,y,z", "-x,-y,-z"] },
    Entry { number: 3, hm: "P 1 2 1", aliases: &["P 2"], centering: Centering::P, ops: &["x,y,z", "-x,y,-z"] },
    Entry { number: 4, hm: "P 1 21 1", aliases: &["P 21"], centering: Centering::P, ops: &["x,y,z", "-x,y+1/2,-z"] },
    Entry { number: 5, hm: "C 1 2 1", aliases: &["C 2"], centering: Centering::C, ops: &["x,y,z", "-x,y,-z"] },
    Entry { number: 6, hm: "P 1 m 1", aliases: &["P m"], centering: Centering::P, ops: &["x,y,z", "x,-y,z"] },
    Entry {
        number: 10,
        hm: "P 1 2/m 1",
        aliases: &["P 2/m"],
        centering: Centering::P,
        ops: &["x,y,z", "-x,y,-z", "-x,-y,-z", "x,-y,z"],
    },
    Entry {
        number: 14,
        hm: "P 1 21/c 1",
        aliases: &["P 21/c"],
        centering: Centering::P,
        ops: &["x,y,z", "-x,y+1/2,-z+1/2", "-x,-y,-z", "x,-y+1/2,z+1/2"],
    },
    Entry {
        number: 15,
        hm: "C 1 2/c 1",
        aliases: &["C 2/c"],
        centering: Centering::C,
        ops: &["x,y,z", "-x,y,-z+1/2", "-x,-y,-z", "x,-y,z+1/2"],
    },
    Entry { number: 16, hm: "P 2 2 2", aliases: &[], centering: Centering::P, ops: P222_OPS },
    Entry {
        number: 17,
        hm: "P 2 2 21",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-x,-y,z+1/2", "-x,y,-z+1/2", "x,-y,-z"],
    },
    Entry {
        number: 18,
        hm: "P 21 21 2",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-x,-y,z", "-x+1/2,y+1/2,-z", "x+1/2,-y+1/2,-z"],
    },
    Entry {
        number: 19,
        hm: "P 21 21 21",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-x+1/2,-y,z+1/2", "-x,y+1/2,-z+1/2", "x+1/2,-y+1/2,-z"],
    },
    Entry {
        number: 20,
        hm: "C 2 2 21",
        aliases: &[],
        centering: Centering::C,
        ops: &["x,y,z", "-x,-y,z+1/2", "-x,y,-z+1/2", "x,-y,-z"],
    },
    Entry { number: 22, hm: "F 2 2 2", aliases: &[], centering: Centering::F, ops: P222_OPS },
    Entry { number: 23, hm: "I 2 2 2", aliases: &[], centering: Centering::I, ops: P222_OPS },
    Entry { number: 75, hm: "P 4", aliases: &[], centering: Centering::P, ops: P4_OPS },
    Entry {
        number: 76,
        hm: "P 41",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-x,-y,z+1/2", "-y,x,z+1/4", "y,-x,z+3/4"],
    },
    Entry {
        number: 78,
        hm: "P 43",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-x,-y,z+1/2", "-y,x,z+3/4", "y,-x,z+1/4"],
    },
    Entry { number: 79, hm: "I 4", aliases: &[], centering: Centering::I, ops: P4_OPS },
    Entry {
        number: 89,
        hm: "P 4 2 2",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-x,-y,z", "-y,x,z", "y,-x,z", "-x,y,-z", "x,-y,-z", "y,x,-z", "-y,-x,-z"],
    },
    Entry {
        number: 92,
        hm: "P 41 21 2",
        aliases: &[],
        centering: Centering::P,
        ops: &[
            "x,y,z", "-x,-y,z+1/2", "-y+1/2,x+1/2,z+1/4", "y+1/2,-x+1/2,z+3/4",
            "-x+1/2,y+1/2,-z+1/4", "x+1/2,-y+1/2,-z+3/4", "y,x,-z", "-y,-x,-z+1/2",
        ],
    },
    Entry {
        number: 96,
        hm: "P 43 21 2",
        aliases: &[],
        centering: Centering::P,
        ops: &[
            "x,y,z", "-x,-y,z+1/2", "-y+1/2,x+1/2,z+3/4", "y+1/2,-x+1/2,z+1/4",
            "-x+1/2,y+1/2,-z+3/4", "x+1/2,-y+1/2,-z+1/4", "y,x,-z", "-y,-x,-z+1/2",
        ],
    },
    Entry { number: 143, hm: "P 3", aliases: &[], centering: Centering::P, ops: P3_OPS },
    Entry {
        number: 144,
        hm: "P 31",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-y,x-y,z+1/3", "-x+y,-x,z+2/3"],
    },
    Entry { number: 146, hm: "R 3:H", aliases: &["H 3", "R 3"], centering: Centering::R, ops: P3_OPS },
    Entry {
        number: 150,
        hm: "P 3 2 1",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-y,x-y,z", "-x+y,-x,z", "y,x,-z", "x-y,-y,-z", "-x,-x+y,-z"],
    },
    Entry {
        number: 168,
        hm: "P 6",
        aliases: &[],
        centering: Centering::P,
        ops: &["x,y,z", "-y,x-y,z", "-x+y,-x,z", "-x,-y,z", "y,-x+y,z", "x-y,x,z"],
    },
    Entry {
        number: 169,
        hm: "P 61",
        aliases: &[],
        centering: Centering::P,
        ops: &[
            "x,y,z", "-y,x-y,z+1/3", "-x+y,-x,z+2/3", "-x,-y,z+1/2", "y,-x+y,z+5/6", "x-y,x,z+1/6",
        ],
    },
    Entry {
        number: 182,
        hm: "P 63 2 2",
        aliases: &[],
        centering: Centering::P,
        ops: &[
            "x,y,z", "-y,x-y,z", "-x+y,-x,z", "-x,-y,z+1/2", "y,-x+y,z+1/2", "x-y,x,z+1/2",
            "y,x,-z", "x-y,-y,-z", "-x,-x+y,-z", "-y,-x,-z+1/2", "-x+y,y,-z+1/2", "x,x-y,-z+1/2",
        ],
    },
    Entry { number: 195, hm: "P 2 3", aliases: &[], centering: Centering::P, ops: P23_OPS },
    Entry { number: 197, hm: "I 2 3", aliases: &[], centering: Centering::I, ops: P23_OPS },
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

impl SpaceGroup {
    /// Look up a built-in space group by its International Tables number.
    pub fn by_number(number: u16) -> Result<Self, SymmetryError> {
        let entry = TABLE
            .iter()
            .find(|e| e.number == number)
            .ok_or_else(|| SymmetryError::UnknownSpaceGroup(number.to_string()))?;
        Self::from_entry(entry)
    }

    /// Look up a built-in space group by Hermann-Mauguin symbol.
    ///
    /// Whitespace and case are ignored, so `"P 21 21 21"`, `"p212121"` and
    /// the short monoclinic form `"P 21"` all resolve.
    pub fn by_name(name: &str) -> Result<Self, SymmetryError> {
        let wanted = normalize(name);
        let entry = TABLE
            .iter()
            .find(|e| {
                normalize(e.hm) == wanted || e.aliases.iter().any(|a| normalize(a) == wanted)
            })
            .ok_or_else(|| SymmetryError::UnknownSpaceGroup(name.to_string()))?;
        Self::from_entry(entry)
    }

    fn from_entry(entry: &Entry) -> Result<Self, SymmetryError> {
        let sym_ops = entry
            .ops
            .iter()
            .map(|t| SymOp::parse(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            number: entry.number,
            hm: entry.hm.to_string(),
            sym_ops,
            cen_ops: entry.centering.vectors(),
        })
    }

    /// Build a group from its full operation list.
    ///
    /// Pure translations become centring vectors and one operation is kept
    /// per distinct rotation. The list must contain the identity.
    pub fn from_operations(hm: &str, number: u16, ops: &[SymOp]) -> Result<Self, SymmetryError> {
        if !ops.iter().any(SymOp::is_identity) {
            return Err(SymmetryError::UnknownSpaceGroup(format!(
                "{hm}: operation list lacks the identity"
            )));
        }
        let mut cen_ops = vec![[0, 0, 0]];
        for op in ops.iter().filter(|op| op.is_translation()) {
            if !cen_ops.contains(&op.tran) {
                cen_ops.push(op.tran);
            }
        }
        let mut sym_ops = vec![SymOp::identity()];
        for op in ops {
            if !sym_ops.iter().any(|s| s.rot == op.rot) {
                sym_ops.push(*op);
            }
        }
        Ok(Self {
            number,
            hm: hm.to_string(),
            sym_ops,
            cen_ops,
        })
    }

    /// Build a group from coordinate triplets.
    pub fn from_triplets(hm: &str, number: u16, triplets: &[&str]) -> Result<Self, SymmetryError> {
        let ops = triplets
            .iter()
            .map(|t| SymOp::parse(t))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_operations(hm, number, &ops)
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    /// Hermann-Mauguin symbol.
    pub fn hm(&self) -> &str {
        &self.hm
    }

    /// Lattice centring letter (`P`, `C`, `I`, `F`, `R`, ...).
    pub fn lattice_type(&self) -> char {
        self.hm.chars().next().unwrap_or('P')
    }

    pub fn sym_ops(&self) -> &[SymOp] {
        &self.sym_ops
    }

    pub fn cen_ops(&self) -> &[[i32; 3]] {
        &self.cen_ops
    }

    /// Every operation of the group: each centring vector applied to each
    /// primitive operation, centring in the outer loop.
    pub fn operations(&self) -> Vec<SymOp> {
        self.cen_ops
            .iter()
            .flat_map(|cen| self.sym_ops.iter().map(move |op| op.add_centering(*cen)))
            .collect()
    }

    pub fn order(&self) -> usize {
        self.sym_ops.len() * self.cen_ops.len()
    }

    pub fn is_centrosymmetric(&self) -> bool {
        self.sym_ops.iter().any(SymOp::is_inversion)
    }

    /// A group is polar unless every axis is flipped by some operation.
    pub fn is_polar(&self) -> bool {
        let flipped = |axis: usize| {
            self.sym_ops
                .iter()
                .any(|op| op.rot[axis].iter().any(|&v| v < 0))
        };
        !(0..3).all(flipped)
    }
}

impl fmt::Display for SpaceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hm, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses() {
        for entry in TABLE {
            let sg = SpaceGroup::from_entry(entry).unwrap();
            assert_eq!(sg.operations().len(), sg.order());
            assert!(sg.operations()[0].is_identity(), "{}", entry.hm);
        }
    }

    #[test]
    fn lookup_by_name_and_number() {
        let a = SpaceGroup::by_name("p 21 21 21").unwrap();
        let b = SpaceGroup::by_number(19).unwrap();
        assert_eq!(a, b);
        assert_eq!(SpaceGroup::by_name("P21").unwrap().number(), 4);
        assert_eq!(SpaceGroup::by_name("P1211").unwrap().number(), 4);
        assert!(SpaceGroup::by_number(230).is_err());
        assert!(SpaceGroup::by_name("Q 1").is_err());
    }

    #[test]
    fn centering_expands_operations() {
        let c2 = SpaceGroup::by_number(5).unwrap();
        assert_eq!(c2.order(), 4);
        assert_eq!(c2.lattice_type(), 'C');
        let ops = c2.operations();
        assert_eq!(ops[2].tran, [12, 12, 0]);
        assert!(ops[2].is_translation());
        assert_eq!(SpaceGroup::by_number(146).unwrap().order(), 9);
    }

    #[test]
    fn from_operations_recovers_centering() {
        let c2 = SpaceGroup::by_number(5).unwrap();
        let rebuilt = SpaceGroup::from_operations(c2.hm(), 5, &c2.operations()).unwrap();
        assert_eq!(rebuilt.order(), c2.order());
        assert_eq!(rebuilt.cen_ops(), c2.cen_ops());

        let missing_identity = [SymOp::parse("-x,-y,-z").unwrap()];
        assert!(SpaceGroup::from_operations("?", 0, &missing_identity).is_err());
    }

    #[test]
    fn centrosymmetric_and_polar() {
        assert!(SpaceGroup::by_number(2).unwrap().is_centrosymmetric());
        assert!(!SpaceGroup::by_number(19).unwrap().is_centrosymmetric());
        assert!(SpaceGroup::by_number(1).unwrap().is_polar());
        assert!(SpaceGroup::by_number(4).unwrap().is_polar());
        assert!(SpaceGroup::by_number(168).unwrap().is_polar());
        assert!(!SpaceGroup::by_number(19).unwrap().is_polar());
        assert!(!SpaceGroup::by_number(2).unwrap().is_polar());
    }
}
