//! Python bindings for nano-vad-core via PyO3.

use pyo3::exceptions::{PyMemoryError, PyValueError};
use pyo3::prelude::*;

use nano_vad_core::{
    layers::Layer, math, model::SequentialModel, vad, Arena, BatchNorm2d, ChwLayout,
    Conv2dBnLayer, Conv2dConfig, Conv2dData, Conv2dFilter, FlattenLayer, LeakyReLULayer, LinearLayer,
    LinearParam, NanoError, Shape,
};

fn to_py_err(e: NanoError) -> PyErr {
    match e {
        NanoError::MallocFail { .. } => PyMemoryError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn extent(value: usize, what: &str) -> PyResult<u16> {
    u16::try_from(value).map_err(|_| PyValueError::new_err(format!("{} does not fit in 16 bits", what)))
}

/// Parameters live as long as the model; Python hands them over once.
fn leak(values: Vec<f64>) -> &'static [f64] {
    Box::leak(values.into_boxed_slice())
}

/// Output extent of one conv axis (0 where undefined or above 65535).
#[pyfunction]
fn out_len(raw_len: u16, pad_len: u16, filter_len: u16, stride: u16) -> u16 {
    math::out_len(raw_len, pad_len, filter_len, stride)
}

/// Fused conv + batch norm over a `channel × row × col` map.
///
/// Returns `(data, (channel, row, col))` of the output.
#[pyfunction]
#[pyo3(signature = (input, shape, weights, kernel, mean, var, gamma, beta, stride=1, pad=0))]
#[allow(clippy::too_many_arguments)]
fn conv2d_bn_no_bias(
    input: Vec<f64>,
    shape: (u16, u16, u16),
    weights: Vec<f64>,
    kernel: (u16, u16),
    mean: Vec<f64>,
    var: Vec<f64>,
    gamma: Vec<f64>,
    beta: Vec<f64>,
    stride: u16,
    pad: u16,
) -> PyResult<(Vec<f64>, (u16, u16, u16))> {
    let (channel, row, col) = shape;
    let filter_num = extent(mean.len(), "filter count")?;
    let config = Conv2dConfig::new(
        stride,
        pad,
        Conv2dFilter::new(kernel.0, kernel.1, channel, filter_num, &weights),
        BatchNorm2d::new(filter_num, &mean, &var, &gamma, &beta),
    );
    let input = Conv2dData::new(row, col, channel, input);

    let (out_row, out_col, out_chan) = math::conv_output_dims(&input, &config).map_err(to_py_err)?;
    let len = ChwLayout::new(out_chan as usize, out_row as usize, out_col as usize)
        .checked_len()
        .map_err(to_py_err)?;
    let mut output = Conv2dData::new(0, 0, 0, vec![0.0; len]);
    math::conv2d_bn_no_bias(&input, &config, &mut output).map_err(to_py_err)?;
    Ok((output.data, (output.channel, output.row, output.col)))
}

#[pyfunction]
fn leaky_relu(neg_slope: f64, input: Vec<f64>) -> PyResult<Vec<f64>> {
    let size = extent(input.len(), "input size")?;
    let mut out = vec![0.0; input.len()];
    math::leaky_relu(neg_slope, &input, size, &mut out).map_err(to_py_err)?;
    Ok(out)
}

/// Dense layer; `weight` is `len(bias) × len(input)` row-major.
#[pyfunction]
fn linear_layer(input: Vec<f64>, weight: Vec<f64>, bias: Vec<f64>) -> PyResult<Vec<f64>> {
    let param = LinearParam::new(
        extent(input.len(), "input size")?,
        extent(bias.len(), "feature size")?,
        &weight,
        &bias,
    );
    let mut out = vec![0.0; bias.len()];
    math::linear_layer(&input, &param, &mut out).map_err(to_py_err)?;
    Ok(out)
}

/// Merge per-frame classes into `(start, end)` sample ranges.
#[pyfunction]
fn voice_segments(classes: Vec<usize>, starts: Vec<usize>, raw_len: usize) -> PyResult<Vec<(usize, usize)>> {
    let segments = vad::voice_segments(&classes, &starts, raw_len).map_err(to_py_err)?;
    Ok(segments.into_iter().map(|s| (s.start, s.end)).collect())
}

/// A sequential double-precision model built layer by layer from Python.
#[pyclass]
pub struct PySequentialModel {
    arena_buf: Vec<f64>,
    input_shape: Shape,
    layers: Vec<Box<dyn Layer>>,
}

impl PySequentialModel {
    fn current_output_shape(&self) -> PyResult<Shape> {
        let mut shape = self.input_shape;
        for layer in self.layers.iter() {
            shape = layer.output_shape(&shape).map_err(to_py_err)?;
        }
        Ok(shape)
    }

    /// Add `layer` only if it accepts the current output.
    fn push(&mut self, layer: Box<dyn Layer>) -> PyResult<()> {
        let shape = self.current_output_shape()?;
        layer.output_shape(&shape).map_err(to_py_err)?;
        self.layers.push(layer);
        Ok(())
    }

    fn with_model<R>(&self, f: impl FnOnce(&SequentialModel<'_>) -> PyResult<R>) -> PyResult<R> {
        let layer_refs: Vec<&dyn Layer> = self.layers.iter().map(|l| l.as_ref()).collect();
        let model = SequentialModel::new(&layer_refs, self.input_shape).map_err(to_py_err)?;
        f(&model)
    }
}

#[pymethods]
impl PySequentialModel {
    #[new]
    fn new(input_shape: Vec<usize>, arena_size: usize) -> PyResult<Self> {
        let shape = match input_shape.len() {
            1 => Shape::d1(input_shape[0]),
            2 => Shape::d2(input_shape[0], input_shape[1]),
            3 => Shape::d3(input_shape[0], input_shape[1], input_shape[2]),
            _ => return Err(PyValueError::new_err("input_shape must have 1-3 dimensions")),
        };
        Ok(Self { arena_buf: vec![0.0; arena_size], input_shape: shape, layers: Vec::new() })
    }

    /// Fused conv + BN; the filter count is `len(mean)`.
    #[pyo3(signature = (weights, kernel, mean, var, gamma, beta, stride=1, pad=0))]
    #[allow(clippy::too_many_arguments)]
    fn add_conv2d_bn(
        &mut self,
        weights: Vec<f64>,
        kernel: (u16, u16),
        mean: Vec<f64>,
        var: Vec<f64>,
        gamma: Vec<f64>,
        beta: Vec<f64>,
        stride: u16,
        pad: u16,
    ) -> PyResult<()> {
        let shape = self.current_output_shape()?;
        if shape.ndim != 3 {
            return Err(PyValueError::new_err("conv2d_bn needs a [C, H, W] input"));
        }
        let channel = extent(shape.channels(), "channel count")?;
        let filter_num = extent(mean.len(), "filter count")?;
        let config = Conv2dConfig::new(
            stride,
            pad,
            Conv2dFilter::new(kernel.0, kernel.1, channel, filter_num, leak(weights)),
            BatchNorm2d::new(filter_num, leak(mean), leak(var), leak(gamma), leak(beta)),
        );
        self.push(Box::new(Conv2dBnLayer::new(config)))
    }

    #[pyo3(signature = (neg_slope=0.01))]
    fn add_leaky_relu(&mut self, neg_slope: f64) -> PyResult<()> {
        self.push(Box::new(LeakyReLULayer::new(neg_slope)))
    }

    fn add_flatten(&mut self) -> PyResult<()> {
        self.push(Box::new(FlattenLayer))
    }

    fn add_linear(&mut self, weight: Vec<f64>, bias: Vec<f64>) -> PyResult<()> {
        let inp_size = extent(self.current_output_shape()?.total(), "input size")?;
        let fea_size = extent(bias.len(), "feature size")?;
        let param = LinearParam::new(inp_size, fea_size, leak(weight), leak(bias));
        let layer = LinearLayer::new(param).map_err(to_py_err)?;
        self.push(Box::new(layer))
    }

    fn forward(&mut self, input: Vec<f64>) -> PyResult<Vec<f64>> {
        let layer_refs: Vec<&dyn Layer> = self.layers.iter().map(|l| l.as_ref()).collect();
        let model = SequentialModel::new(&layer_refs, self.input_shape).map_err(to_py_err)?;
        let mut arena = Arena::new(&mut self.arena_buf);
        let (output, _shape) = model.forward(&input, &mut arena).map_err(to_py_err)?;
        Ok(output.to_vec())
    }

    fn predict(&mut self, input: Vec<f64>) -> PyResult<usize> {
        let layer_refs: Vec<&dyn Layer> = self.layers.iter().map(|l| l.as_ref()).collect();
        let model = SequentialModel::new(&layer_refs, self.input_shape).map_err(to_py_err)?;
        let mut arena = Arena::new(&mut self.arena_buf);
        model.predict(&input, &mut arena).map_err(to_py_err)
    }

    fn output_shape(&self) -> PyResult<Vec<usize>> {
        let shape = self.current_output_shape()?;
        Ok(shape.dims[..shape.ndim].to_vec())
    }

    fn estimate_arena_size(&self) -> PyResult<usize> {
        self.with_model(|model| model.estimate_arena_size().map_err(to_py_err))
    }

    fn num_layers(&self) -> usize { self.layers.len() }
    fn layer_names(&self) -> Vec<String> { self.layers.iter().map(|l| l.name().to_string()).collect() }
}

#[pymodule]
fn nano_vad_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(out_len, m)?)?;
    m.add_function(wrap_pyfunction!(conv2d_bn_no_bias, m)?)?;
    m.add_function(wrap_pyfunction!(leaky_relu, m)?)?;
    m.add_function(wrap_pyfunction!(linear_layer, m)?)?;
    m.add_function(wrap_pyfunction!(voice_segments, m)?)?;
    m.add_class::<PySequentialModel>()?;
    Ok(())
}
