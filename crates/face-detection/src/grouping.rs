//! Clustering of raw sliding-window hits into face regions
//!
//! Hits are partitioned into equivalence classes of similar rectangles, each
//! class is averaged, and classes with too few members (neighbors) are dropped.
//! Output order is the order in which each class's first member was found.

use deepfake_common::FaceRegion;

/// Relative tolerance used when deciding whether two hits are the same face
pub const GROUP_EPS: f64 = 0.2;

fn similar(a: &FaceRegion, b: &FaceRegion, eps: f64) -> bool {
    let delta = eps * f64::from(a.width.min(b.width) + a.height.min(b.height)) * 0.5;
    let close = |p: i32, q: i32| f64::from((p - q).abs()) <= delta;

    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Label each rectangle with its class; classes are numbered by first appearance.
fn partition(rects: &[FaceRegion], eps: f64) -> (Vec<usize>, usize) {
    let mut parent: Vec<usize> = (0..rects.len()).collect();

    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; rects.len()];
    let mut labels = Vec::with_capacity(rects.len());
    let mut classes = 0;
    for i in 0..rects.len() {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = classes;
            classes += 1;
        }
        labels.push(class_of_root[root]);
    }

    (labels, classes)
}

/// Merge overlapping hits, keeping clusters with more than `min_neighbors` members.
///
/// With `min_neighbors == 0` the hits are returned untouched.
#[must_use]
pub fn group_rectangles(rects: &[FaceRegion], min_neighbors: usize, eps: f64) -> Vec<FaceRegion> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, classes) = partition(rects, eps);

    let mut sums = vec![[0i64; 4]; classes];
    let mut counts = vec![0usize; classes];
    for (rect, &label) in rects.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += i64::from(rect.x);
        s[1] += i64::from(rect.y);
        s[2] += i64::from(rect.width);
        s[3] += i64::from(rect.height);
        counts[label] += 1;
    }

    let averaged: Vec<FaceRegion> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            FaceRegion::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut grouped = Vec::with_capacity(classes);
    for i in 0..classes {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let r1 = averaged[i];

        // Drop clusters nested inside a better-supported cluster
        let nested = (0..classes).any(|j| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let r2 = averaged[j];
            let dx = (f64::from(r2.width) * eps).round() as i32;
            let dy = (f64::from(r2.height) * eps).round() as i32;

            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.x + r1.width <= r2.x + r2.width + dx
                && r1.y + r1.height <= r2.y + r2.height + dy
                && (n2 > n1.max(3) || n1 < 3)
        });

        if !nested {
            grouped.push(r1);
        }
    }

    grouped
}
