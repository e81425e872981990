// Gradient bookkeeping - blames, delta-weight accumulation and aggregation
//
// Blames follow the delta rule. The output layer is seeded with
// `targets - outputs`; every layer then computes, per node i,
//
//   contribution[i] = next_blame[i]                            (output layer)
//   contribution[i] = sum_j W_next[j][i] * next_blame[j]       (hidden layers)
//   blame[i]       += dydk(i, outputs, i) * contribution[i]
//
// using that layer's own activation and outputs. Delta weights accumulate
// `blame[i] * inputs` and are only scaled by the learning rate when the
// per-worker averages are merged into the master network.

use crate::analysis::vector;
use crate::error::TrainingError;
use crate::network::MultiLayerPerceptron;

/// Back-propagate blame after a training-mode forward pass
///
/// # Errors
/// `DimensionMismatch` if `targets` does not match the output layer, and
/// `NumericAnomaly` if a blame is not finite.
pub fn backpropagate(network: &mut MultiLayerPerceptron, targets: &[f64]) -> Result<(), TrainingError> {
    let layers = network.layers_mut();
    let Some(output) = layers.last() else {
        return Err(TrainingError::InvalidTopology {
            reason: "network has no layers".to_string(),
        });
    };
    if output.last_outputs().len() != targets.len() {
        return Err(TrainingError::DimensionMismatch {
            what: "target",
            expected: output.last_outputs().len(),
            actual: targets.len(),
        });
    }

    let mut next_blames = vector::sub(targets, output.last_outputs());
    for index in (0..layers.len()).rev() {
        let (head, tail) = layers.split_at_mut(index + 1);
        let current = &mut head[index];
        let next = tail.first();

        let activation = current.activation();
        let outputs = current.last_outputs().to_vec();
        let blames = current.blames_mut();
        for (i, blame) in blames.iter_mut().enumerate() {
            let contribution = match next {
                Some(next) => next
                    .nodes()
                    .iter()
                    .zip(&next_blames)
                    .map(|(node, next_blame)| node.weights()[i] * next_blame)
                    .sum::<f64>(),
                None => next_blames[i],
            };
            *blame += activation.dydk_at(i, &outputs, i) * contribution;
            if !blame.is_finite() {
                return Err(TrainingError::NumericAnomaly {
                    layer: index,
                    node: i,
                    quantity: "blame",
                });
            }
        }
        next_blames = blames.to_vec();
    }
    Ok(())
}

/// Add `blame[i] * inputs` to every node's delta weights
pub fn accumulate_delta_weights(network: &mut MultiLayerPerceptron) {
    for layer in network.layers_mut() {
        let inputs = layer.last_inputs().to_vec();
        let blames = layer.blames().to_vec();
        for (node, blame) in layer.nodes_mut().iter_mut().zip(blames) {
            vector::add_scaled_to(&mut node.delta_weights, &inputs, blame);
        }
    }
}

/// Divide every delta-weight vector by `examples` (no-op for zero)
pub fn average_delta_weights(network: &mut MultiLayerPerceptron, examples: usize) {
    if examples == 0 {
        return;
    }
    let scale = 1.0 / examples as f64;
    for layer in network.layers_mut() {
        for node in layer.nodes_mut() {
            vector::scale(&mut node.delta_weights, scale);
        }
    }
}

/// Copy of every node's delta weights, in layer then node order
pub fn snapshot_delta_weights(network: &MultiLayerPerceptron) -> Vec<Vec<f64>> {
    network
        .layers()
        .iter()
        .flat_map(|layer| layer.nodes().iter().map(|node| node.delta_weights().to_vec()))
        .collect()
}

/// Put back delta weights taken by `snapshot_delta_weights`
pub fn restore_delta_weights(network: &mut MultiLayerPerceptron, snapshot: &[Vec<f64>]) {
    let nodes = network
        .layers_mut()
        .iter_mut()
        .flat_map(|layer| layer.nodes_mut().iter_mut());
    for (node, saved) in nodes.zip(snapshot) {
        node.delta_weights.clone_from(saved);
    }
}

/// Fail with `NumericAnomaly` on the first non-finite weight or delta weight
pub fn check_finite(network: &MultiLayerPerceptron) -> Result<(), TrainingError> {
    for (layer_index, layer) in network.layers().iter().enumerate() {
        for (node_index, node) in layer.nodes().iter().enumerate() {
            let anomaly = |quantity| TrainingError::NumericAnomaly {
                layer: layer_index,
                node: node_index,
                quantity,
            };
            if vector::first_non_finite(node.delta_weights()).is_some() {
                return Err(anomaly("delta-weight"));
            }
            if vector::first_non_finite(node.weights()).is_some() {
                return Err(anomaly("weight"));
            }
        }
    }
    Ok(())
}

/// Merge per-worker delta weights into `master` and resynchronise workers
///
/// For each node the workers' delta-weight vectors are averaged, scaled by
/// `learning_rate` and added to the master weights. The new master weights
/// are copied into every worker and all delta weights are zeroed.
pub fn aggregate(
    master: &mut MultiLayerPerceptron,
    workers: &mut [&mut MultiLayerPerceptron],
    learning_rate: f64,
) -> Result<(), TrainingError> {
    if workers.is_empty() {
        return Ok(());
    }
    let share = learning_rate / workers.len() as f64;

    for (layer_index, layer) in master.layers_mut().iter_mut().enumerate() {
        for (node_index, node) in layer.nodes_mut().iter_mut().enumerate() {
            for worker in workers.iter() {
                let delta = worker
                    .layer(layer_index)
                    .and_then(|layer| layer.delta_weights(node_index))
                    .ok_or_else(|| TrainingError::InvalidTopology {
                        reason: format!(
                            "worker network lacks node {} of layer {}",
                            node_index, layer_index
                        ),
                    })?;
                if delta.len() != node.weights.len() {
                    return Err(TrainingError::DimensionMismatch {
                        what: "worker delta-weight",
                        expected: node.weights.len(),
                        actual: delta.len(),
                    });
                }
                vector::add_scaled_to(&mut node.weights, delta, share);
            }
            node.delta_weights.fill(0.0);
        }
    }
    check_finite(master)?;

    for worker in workers.iter_mut() {
        worker.copy_weights_from(master);
        worker.zero_delta_weights();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Activation, Layer};

    fn network(sizes: &[usize], input_len: usize, weight: f64) -> MultiLayerPerceptron {
        let mut network = MultiLayerPerceptron::new(0.2, 0.8, Some(5));
        let mut fan_in = input_len;
        for &size in sizes {
            let mut layer = Layer::new(size, Activation::logistic(1.0)).unwrap();
            for node in 0..size {
                layer.set_weights(node, vec![weight; fan_in]).unwrap();
            }
            network.append(layer);
            fan_in = size;
        }
        network
    }

    fn set_delta(network: &mut MultiLayerPerceptron, delta: &[f64]) {
        for layer in network.layers_mut() {
            for node in layer.nodes_mut() {
                node.delta_weights = delta.to_vec();
            }
        }
    }

    #[test]
    fn test_output_and_hidden_blames() {
        let mut net = network(&[2, 1], 2, 0.0);
        net.set_weights(0, 0, vec![1.0, 0.0]).unwrap();
        net.set_weights(0, 1, vec![0.0, -1.0]).unwrap();
        net.set_weights(1, 0, vec![0.5, -2.0]).unwrap();

        let outputs = net.evaluate_mode(&[1.0, 2.0], true).unwrap();
        backpropagate(&mut net, &[1.0]).unwrap();

        let y = outputs[0];
        let out_blame = y * (1.0 - y) * (1.0 - y);
        assert!((net.layer(1).unwrap().blames()[0] - out_blame).abs() < 1e-12);

        let hidden = net.layer(0).unwrap().last_outputs().to_vec();
        let expected = [
            hidden[0] * (1.0 - hidden[0]) * 0.5 * out_blame,
            hidden[1] * (1.0 - hidden[1]) * -2.0 * out_blame,
        ];
        for (blame, expected) in net.layer(0).unwrap().blames().iter().zip(expected) {
            assert!((blame - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_output_layer_uses_own_blame_per_node() {
        // Two output nodes: each node's contribution is its own residual,
        // not the sum of all residuals.
        let mut net = network(&[2], 1, 0.0);
        net.evaluate_mode(&[1.0], true).unwrap();
        backpropagate(&mut net, &[1.0, 0.0]).unwrap();

        let blames = net.layer(0).unwrap().blames();
        assert!((blames[0] - 0.25 * 0.5).abs() < 1e-12);
        assert!((blames[1] + 0.25 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_target_length_is_checked() {
        let mut net = network(&[1], 1, 0.0);
        net.evaluate_mode(&[1.0], true).unwrap();
        assert!(matches!(
            backpropagate(&mut net, &[1.0, 0.0]),
            Err(TrainingError::DimensionMismatch { what: "target", .. })
        ));
    }

    #[test]
    fn test_delta_weights_accumulate_and_average() {
        let mut net = network(&[1], 2, 0.0);
        for _ in 0..2 {
            net.evaluate_mode(&[2.0, 4.0], true).unwrap();
            backpropagate(&mut net, &[1.0]).unwrap();
            accumulate_delta_weights(&mut net);
        }
        // blame = 0.25 * 0.5 per example
        assert_eq!(net.layer(0).unwrap().delta_weights(0).unwrap(), &[0.5, 1.0]);

        average_delta_weights(&mut net, 2);
        assert_eq!(net.layer(0).unwrap().delta_weights(0).unwrap(), &[0.25, 0.5]);
    }

    #[test]
    fn test_aggregation_averages_workers() {
        let mut master = network(&[1], 2, 1.0);
        let mut a = master.clone();
        let mut b = master.clone();
        set_delta(&mut a, &[0.5, -0.25]);
        set_delta(&mut b, &[0.5, -0.25]);

        let rate = 1.0 / (1.0 + 0.01 * 0.0);
        aggregate(&mut master, &mut [&mut a, &mut b], rate).unwrap();

        // learning_rate * d, not 2 * d
        assert_eq!(master.weights(0, 0).unwrap(), &[1.5, 0.75]);
        for worker in [&a, &b] {
            assert_eq!(worker.weights(0, 0).unwrap(), &[1.5, 0.75]);
            assert_eq!(worker.layer(0).unwrap().delta_weights(0).unwrap(), &[0.0, 0.0]);
        }
    }

    #[test]
    fn test_aggregation_scales_by_learning_rate() {
        let mut master = network(&[1], 1, 0.0);
        let mut a = master.clone();
        let mut b = master.clone();
        set_delta(&mut a, &[1.0]);
        set_delta(&mut b, &[3.0]);

        aggregate(&mut master, &mut [&mut a, &mut b], 0.5).unwrap();

        assert_eq!(master.weights(0, 0).unwrap(), &[1.0]);
    }

    #[test]
    fn test_non_finite_delta_is_reported() {
        let mut net = network(&[1, 1], 1, 0.0);
        net.layers_mut()[1].nodes_mut()[0].delta_weights = vec![f64::NAN];
        assert_eq!(
            check_finite(&net),
            Err(TrainingError::NumericAnomaly {
                layer: 1,
                node: 0,
                quantity: "delta-weight"
            })
        );
    }
}
