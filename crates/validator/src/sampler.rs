use common::Hotkey;
use rand::Rng;
use rand::seq::SliceRandom;
use registry::MetagraphView;

/// Picks up to `k` distinct peers uniformly at random from the registry,
/// excluding self. Fewer than `k` known peers returns all of them; the draw
/// is intentionally non-deterministic per call.
pub fn sample_peers<R: Rng>(
    metagraph: &dyn MetagraphView,
    k: usize,
    self_hotkey: &str,
    rng: &mut R,
) -> Vec<Hotkey> {
    let mut peers: Vec<Hotkey> = metagraph
        .list_known_peers()
        .into_iter()
        .filter(|peer| peer != self_hotkey)
        .collect();
    peers.shuffle(rng);
    peers.truncate(k);
    peers
}
