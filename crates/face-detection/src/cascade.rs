//! Boosted Haar cascade model in the OpenCV `opencv-cascade-classifier` XML format
//!
//! Only the current (post-2.4) layout with `BOOST` stages and upright `HAAR`
//! features is supported. Tilted features and the legacy `<trees>` layout are
//! rejected at load time.

use crate::FaceDetectionError;
use roxmltree::{Document, Node};

/// Rectangle of a Haar feature, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// Internal node of a weak classifier tree.
///
/// Child indices `> 0` point to another node, `<= 0` to leaf `-child`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stage {
    pub threshold: f32,
    pub classifiers: Vec<WeakClassifier>,
}

/// A loaded Haar cascade. Immutable once parsed and safe to share across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    pub(crate) stages: Vec<Stage>,
    pub(crate) features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Parse a cascade from OpenCV XML text
    pub fn from_xml(xml: &str) -> Result<Self, FaceDetectionError> {
        let doc = Document::parse(xml)
            .map_err(|e| FaceDetectionError::CascadeParse(format!("Invalid XML: {e}")))?;

        let cascade = doc
            .descendants()
            .find(|n| n.has_tag_name("cascade"))
            .ok_or_else(|| FaceDetectionError::CascadeParse("<cascade> element not found".into()))?;

        if cascade.children().any(|n| n.has_tag_name("trees")) {
            return Err(FaceDetectionError::UnsupportedCascade(
                "legacy <trees> cascade layout".into(),
            ));
        }

        let stage_type = child_text(cascade, "stageType")?;
        if stage_type != "BOOST" {
            return Err(FaceDetectionError::UnsupportedCascade(format!(
                "stage type {stage_type}"
            )));
        }
        let feature_type = child_text(cascade, "featureType")?;
        if feature_type != "HAAR" {
            return Err(FaceDetectionError::UnsupportedCascade(format!(
                "feature type {feature_type}"
            )));
        }

        let window_width: u32 = parse_value(child_text(cascade, "width")?, "width")?;
        let window_height: u32 = parse_value(child_text(cascade, "height")?, "height")?;
        // The variance normalization rectangle excludes a one pixel border
        if window_width < 3 || window_height < 3 {
            return Err(FaceDetectionError::CascadeParse(format!(
                "window {window_width}x{window_height} is too small"
            )));
        }

        let features = elements(child(cascade, "features")?)
            .map(parse_feature)
            .collect::<Result<Vec<_>, _>>()?;

        let stages = elements(child(cascade, "stages")?)
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(FaceDetectionError::CascadeParse("cascade has no stages".into()));
        }

        let cascade = Self {
            window_width,
            window_height,
            stages,
            features,
        };
        cascade.validate()?;
        Ok(cascade)
    }

    /// Detection window size the cascade was trained on
    #[must_use]
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn validate(&self) -> Result<(), FaceDetectionError> {
        for (fi, feature) in self.features.iter().enumerate() {
            for rect in &feature.rects {
                if rect.x + rect.width > self.window_width
                    || rect.y + rect.height > self.window_height
                {
                    return Err(FaceDetectionError::CascadeParse(format!(
                        "feature {fi} rectangle exceeds the detection window"
                    )));
                }
            }
        }

        for (si, stage) in self.stages.iter().enumerate() {
            for classifier in &stage.classifiers {
                for (ni, node) in classifier.nodes.iter().enumerate() {
                    if node.feature >= self.features.len() {
                        return Err(FaceDetectionError::CascadeParse(format!(
                            "stage {si} references missing feature {}",
                            node.feature
                        )));
                    }
                    for child in [node.left, node.right] {
                        // Internal references must point forward so evaluation terminates
                        let in_range = if child > 0 {
                            (child as usize) > ni && (child as usize) < classifier.nodes.len()
                        } else {
                            (child.unsigned_abs() as usize) < classifier.leaves.len()
                        };
                        if !in_range {
                            return Err(FaceDetectionError::CascadeParse(format!(
                                "stage {si} has a dangling tree reference {child}"
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, FaceDetectionError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| FaceDetectionError::CascadeParse(format!("<{name}> element not found")))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, FaceDetectionError> {
    Ok(child(node, name)?.text().unwrap_or_default().trim())
}

fn parse_value<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, FaceDetectionError> {
    text.parse()
        .map_err(|_| FaceDetectionError::CascadeParse(format!("invalid {what}: {text:?}")))
}

fn numbers(text: &str, what: &str) -> Result<Vec<f64>, FaceDetectionError> {
    text.split_whitespace().map(|t| parse_value(t, what)).collect()
}

fn parse_stage(node: Node) -> Result<Stage, FaceDetectionError> {
    let threshold = parse_value(child_text(node, "stageThreshold")?, "stageThreshold")?;
    let classifiers = elements(child(node, "weakClassifiers")?)
        .map(parse_weak_classifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node) -> Result<WeakClassifier, FaceDetectionError> {
    let raw_nodes = numbers(child_text(node, "internalNodes")?, "internalNodes")?;
    if raw_nodes.is_empty() || raw_nodes.len() % 4 != 0 {
        return Err(FaceDetectionError::CascadeParse(format!(
            "internalNodes must hold groups of 4 values, got {}",
            raw_nodes.len()
        )));
    }

    let nodes = raw_nodes
        .chunks_exact(4)
        .map(|n| {
            if n[2] < 0.0 {
                return Err(FaceDetectionError::CascadeParse(format!(
                    "negative feature index {}",
                    n[2]
                )));
            }
            Ok(TreeNode {
                left: n[0] as i32,
                right: n[1] as i32,
                feature: n[2] as usize,
                threshold: n[3] as f32,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let leaves = numbers(child_text(node, "leafValues")?, "leafValues")?
        .into_iter()
        .map(|v| v as f32)
        .collect();

    Ok(WeakClassifier { nodes, leaves })
}

fn parse_feature(node: Node) -> Result<HaarFeature, FaceDetectionError> {
    if let Some(tilted) = node.children().find(|n| n.has_tag_name("tilted")) {
        if tilted.text().map(str::trim).unwrap_or("0") != "0" {
            return Err(FaceDetectionError::UnsupportedCascade(
                "tilted Haar features".into(),
            ));
        }
    }

    let rects = elements(child(node, "rects")?)
        .map(|r| {
            let values = numbers(r.text().unwrap_or_default(), "rect")?;
            if values.len() != 5 || values[..4].iter().any(|v| *v < 0.0) {
                return Err(FaceDetectionError::CascadeParse(format!(
                    "rect must be `x y width height weight`, got {values:?}"
                )));
            }
            Ok(WeightedRect {
                x: values[0] as u32,
                y: values[1] as u32,
                width: values[2] as u32,
                height: values[3] as u32,
                weight: values[4] as f32,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rects.is_empty() {
        return Err(FaceDetectionError::CascadeParse("feature without rects".into()));
    }

    Ok(HaarFeature { rects })
}
