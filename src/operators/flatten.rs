use async_trait::async_trait;

use crate::proxy::Proxy;
use crate::traits::Operator;

/// What a value turns into when flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion<T> {
    /// A sequence-valued item, emitted element by element
    Many(Vec<T>),
    /// A plain item, passed through unchanged
    One(T),
}

/// Payloads that may carry a nested sequence of themselves.
///
/// ```rust
/// use pipestream::operators::{Expand, Expansion};
///
/// enum Node {
///     Leaf(u32),
///     Group(Vec<Node>),
/// }
///
/// impl Expand for Node {
///     fn expand(self) -> Expansion<Self> {
///         match self {
///             Node::Group(children) => Expansion::Many(children),
///             leaf => Expansion::One(leaf),
///         }
///     }
/// }
/// ```
pub trait Expand: Sized {
    fn expand(self) -> Expansion<Self>;
}

/// Expands sequence-valued items into their elements, one level deep.
#[derive(Debug, Default, Clone, Copy)]
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Flatten
    }
}

#[async_trait]
impl<T> Operator<T> for Flatten
where
    T: Expand + Send + 'static,
{
    async fn operate(&self, mut proxy: Proxy<T>) {
        while proxy.next().await.is_ready() {
            let Some(item) = proxy.take() else { continue };
            let forwarded = match item.expand() {
                Expansion::One(item) => proxy.emit(item).await.is_ready(),
                Expansion::Many(items) => {
                    let mut ok = true;
                    for item in items {
                        if !proxy.emit(item).await.is_ready() {
                            ok = false;
                            break;
                        }
                    }
                    ok
                }
            };
            if !forwarded {
                break;
            }
        }
    }
}
