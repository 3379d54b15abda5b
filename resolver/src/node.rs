use inliner::Target;

use crate::content::Content;

/// One entry of the dependency tree produced by a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionNode {
    pub target: Target,
    /// Fully resolved content. For an included resource this is the content
    /// after its transform chain ran.
    pub content: Content,
    /// Included resources, in document order.
    pub children: Vec<ResolutionNode>,
}

impl ResolutionNode {
    pub fn leaf(target: Target, content: Content) -> Self {
        ResolutionNode {
            target,
            content,
            children: Vec::new(),
        }
    }

    /// Visit this node and all descendants depth-first, with their depth.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ResolutionNode, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a ResolutionNode, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, visit);
        }
    }
}
