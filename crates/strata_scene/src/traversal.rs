//! Depth-first pre/post-order traversal with subtree pruning.

use crate::prim::Prim;

/// One step of a [`PrimRange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Visit<'a> {
    pub prim: Prim<'a>,
    /// `false` on entering the prim, `true` on leaving it
    pub post: bool,
}

struct Frame<'a> {
    prim: Prim<'a>,
    children: Vec<Prim<'a>>,
    next: usize,
}

/// Walks a subtree visiting every prim twice.
///
/// Children that are inactive, undefined (`over` only), abstract (`class`)
/// or prototype roots are skipped. Instances have no children, so prototype
/// contents are never reached through their instances.
pub struct PrimRange<'a> {
    stack: Vec<Frame<'a>>,
    pending: Option<Prim<'a>>,
}

fn traversable(prim: &Prim<'_>) -> bool {
    prim.is_active() && prim.is_defined() && !prim.is_abstract() && !prim.is_prototype()
}

impl<'a> PrimRange<'a> {
    /// Range over `root` and its descendants.
    pub fn pre_and_post(root: Prim<'a>) -> Self {
        Self {
            stack: Vec::new(),
            pending: Some(root),
        }
    }

    /// Skip the descendants of the prim that was just pre-visited. Its
    /// post-visit is still produced.
    pub fn prune_children(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.next = frame.children.len();
        }
    }
}

impl<'a> Iterator for PrimRange<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Visit<'a>> {
        let prim = match self.pending.take() {
            Some(prim) => prim,
            None => {
                let frame = self.stack.last_mut()?;
                if frame.next < frame.children.len() {
                    frame.next += 1;
                    frame.children[frame.next - 1]
                } else {
                    let frame = self.stack.pop()?;
                    return Some(Visit {
                        prim: frame.prim,
                        post: true,
                    });
                }
            }
        };

        self.stack.push(Frame {
            prim,
            children: prim.children().filter(traversable).collect(),
            next: 0,
        });
        Some(Visit { prim, post: false })
    }
}

/// Pre-order iterator over `root` and every traversable descendant.
pub fn descendants(root: Prim<'_>) -> impl Iterator<Item = Prim<'_>> {
    PrimRange::pre_and_post(root).filter(|v| !v.post).map(|v| v.prim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    const SCENE: &str = r#"#usda 1.0
def Xform "A" {
    def Xform "B" {
        def Sphere "C" {}
    }
    def Sphere "D" {}
    over "E" {}
    class "F" {}
    def Sphere "G" (active = false) {}
}
"#;

    fn visits(range: PrimRange<'_>) -> Vec<String> {
        range
            .map(|v| format!("{}{}", if v.post { "-" } else { "+" }, v.prim.path()))
            .collect()
    }

    #[test]
    fn test_pre_and_post_order() {
        let stage = Stage::from_string(SCENE).unwrap();
        let a = stage.prim_at_path("/A").unwrap();

        assert_eq!(
            visits(PrimRange::pre_and_post(a)),
            vec!["+/A", "+/A/B", "+/A/B/C", "-/A/B/C", "-/A/B", "+/A/D", "-/A/D", "-/A"]
        );
    }

    #[test]
    fn test_prune_keeps_post_visit() {
        let stage = Stage::from_string(SCENE).unwrap();
        let mut range = PrimRange::pre_and_post(stage.prim_at_path("/A").unwrap());

        let mut seen = Vec::new();
        while let Some(visit) = range.next() {
            if !visit.post && visit.prim.path() == "/A/B" {
                range.prune_children();
            }
            seen.push(format!("{}{}", if visit.post { "-" } else { "+" }, visit.prim.path()));
        }
        assert_eq!(seen, vec!["+/A", "+/A/B", "-/A/B", "+/A/D", "-/A/D", "-/A"]);
    }

    #[test]
    fn test_descendants_from_pseudo_root() {
        let stage = Stage::from_string(SCENE).unwrap();
        let paths: Vec<&str> = descendants(stage.pseudo_root()).map(|p| p.path()).collect();
        assert_eq!(paths, vec!["/", "/A", "/A/B", "/A/B/C", "/A/D"]);
    }
}
